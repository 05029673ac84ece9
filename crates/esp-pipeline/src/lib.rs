//! ESP Pipeline - event ingestion orchestration
//!
//! Drives one inbound event through validation, schema filtering,
//! enrichment, rule groups and tasks, and hands the result to the indexing
//! sink. Rule and task failures are isolated per group; every other failure
//! ends the run with a structured `{error: {message, code}}` response.

pub mod error;
pub mod pipeline;
pub mod request;
pub mod runner;
pub mod settings;
pub mod stage;

// Re-export key types
pub use error::PipelineError;
pub use pipeline::{EventPipeline, PipelineOutcome};
pub use request::{ErrorBody, IngestRequest, IngestResponse};
pub use runner::{FailurePhase, GroupFailure, GroupRunner, TaskOutputs};
pub use settings::{PipelineSettings, DEFAULT_INDEX_PREFIX};
pub use stage::PipelineStage;
