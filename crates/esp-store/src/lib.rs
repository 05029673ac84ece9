//! ESP Store: collaborator interfaces for the ingestion pipeline
//!
//! The pipeline reads schemas and package configuration, stamps events with
//! the current time, and hands finished documents to an indexing sink. Each
//! of these is a trait here so the pipeline never depends on a concrete
//! backend.
//!
//! ## Key Components
//!
//! - `storage_traits`: `SchemaRegistry`, `PackageRegistry`, `IndexSink`, `Clock`
//! - `fakes`: in-memory implementations for tests
//! - `fs`: filesystem-backed implementations used by the `esp` binary

mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fs::{FsIndexSink, FsPackageRegistry, FsSchemaRegistry, StoredDocument};
pub use storage_traits::{
    Acknowledgement, Clock, IndexSink, PackageRegistry, SchemaRegistry, StorageResult,
    SystemClock,
};
