//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemorySchemaRegistry`, `MemoryPackageRegistry`,
//! `MemoryIndexSink` and `FixedClock`, which satisfy the trait contracts
//! without touching the filesystem.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use esp_core::{EventSchema, PackageConfig};
use serde_json::Value;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemorySchemaRegistry
// ---------------------------------------------------------------------------

/// In-memory schema registry keyed by `(package, event name)`.
#[derive(Debug, Default)]
pub struct MemorySchemaRegistry {
    schemas: Mutex<HashMap<(Option<String>, String), EventSchema>>,
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema`; `package` is `None` for bare events.
    pub fn insert(&self, package: Option<&str>, event_name: &str, schema: EventSchema) {
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((package.map(str::to_string), event_name.to_string()), schema);
    }

    pub fn with_schema(self, package: Option<&str>, event_name: &str, schema: EventSchema) -> Self {
        self.insert(package, event_name, schema);
        self
    }
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn lookup(
        &self,
        package: Option<&str>,
        event_name: &str,
    ) -> StorageResult<Option<EventSchema>> {
        let schemas = self.schemas.lock()?;
        Ok(schemas
            .get(&(package.map(str::to_string), event_name.to_string()))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryPackageRegistry
// ---------------------------------------------------------------------------

/// In-memory package registry backed by a `HashMap<package, PackageConfig>`.
#[derive(Debug, Default)]
pub struct MemoryPackageRegistry {
    packages: Mutex<HashMap<String, PackageConfig>>,
}

impl MemoryPackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, package: &str, config: PackageConfig) {
        self.packages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package.to_string(), config);
    }

    pub fn with_package(self, package: &str, config: PackageConfig) -> Self {
        self.insert(package, config);
        self
    }
}

#[async_trait]
impl PackageRegistry for MemoryPackageRegistry {
    async fn lookup(&self, package: &str) -> StorageResult<Option<PackageConfig>> {
        let packages = self.packages.lock()?;
        Ok(packages.get(package).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryIndexSink
// ---------------------------------------------------------------------------

/// One recorded `index` call.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub index: String,
    pub type_name: String,
    pub id: String,
    pub document: Value,
}

/// Recording sink. Every successful call is kept in order; when a failure
/// message is set, calls fail with `StorageError::Backend` and nothing is
/// recorded.
#[derive(Debug, Default)]
pub struct MemoryIndexSink {
    documents: Mutex<Vec<IndexedDocument>>,
    failure: Mutex<Option<String>>,
    attempts: Mutex<usize>,
}

impl MemoryIndexSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every document with `message`.
    pub fn failing(message: &str) -> Self {
        let sink = Self::new();
        sink.set_failure(Some(message));
        sink
    }

    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
            message.map(str::to_string);
    }

    /// Documents stored so far, oldest first.
    pub fn documents(&self) -> Vec<IndexedDocument> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `index` calls, including rejected ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IndexSink for MemoryIndexSink {
    async fn index(
        &self,
        index: &str,
        type_name: &str,
        document: &Value,
    ) -> StorageResult<Acknowledgement> {
        *self.attempts.lock()? += 1;

        if let Some(message) = self.failure.lock()?.clone() {
            return Err(StorageError::Backend(message));
        }

        let mut documents = self.documents.lock()?;
        let id = format!("doc-{}", documents.len() + 1);
        documents.push(IndexedDocument {
            index: index.to_string(),
            type_name: type_name.to_string(),
            id: id.clone(),
            document: document.clone(),
        });
        Ok(Acknowledgement::created(index, type_name, id))
    }
}

// ---------------------------------------------------------------------------
// FixedClock
// ---------------------------------------------------------------------------

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
