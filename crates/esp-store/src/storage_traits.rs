//! Collaborator trait definitions for ESP
//!
//! These traits define what the pipeline needs from the outside world:
//! - `SchemaRegistry`: per-event-type schema lookup
//! - `PackageRegistry`: per-package rule configuration lookup
//! - `IndexSink`: document indexing (the final destination of an event)
//! - `Clock`: the current time, injectable for tests
//!
//! The async traits are backend-agnostic. In-memory fakes are provided for
//! testing via the `fakes` module, filesystem backends via `fs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use esp_core::{EventSchema, PackageConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// SchemaRegistry
// ---------------------------------------------------------------------------

/// Source of event schemas.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Schema for `event_name` within `package` (`None` for bare events).
    /// Returns `Ok(None)` when no schema is registered.
    async fn lookup(
        &self,
        package: Option<&str>,
        event_name: &str,
    ) -> StorageResult<Option<EventSchema>>;
}

// ---------------------------------------------------------------------------
// PackageRegistry
// ---------------------------------------------------------------------------

/// Source of package configuration (rule groups, tasks, ESP manager).
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Returns `Ok(None)` when the package has no configuration.
    async fn lookup(&self, package: &str) -> StorageResult<Option<PackageConfig>>;
}

// ---------------------------------------------------------------------------
// IndexSink
// ---------------------------------------------------------------------------

/// Receipt returned by the sink for an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    pub result: String,
}

impl Acknowledgement {
    /// Acknowledgement for a freshly created document.
    pub fn created(
        index: impl Into<String>,
        type_name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            id: id.into(),
            version: 1,
            result: "created".to_string(),
        }
    }
}

/// Document store receiving enriched events.
///
/// Guarantees:
/// - one call stores exactly one document
/// - the acknowledgement echoes the index and type the document went to
#[async_trait]
pub trait IndexSink: Send + Sync {
    async fn index(
        &self,
        index: &str,
        type_name: &str,
        document: &Value,
    ) -> StorageResult<Acknowledgement>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
