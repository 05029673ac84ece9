//! Filesystem-backed collaborators.
//!
//! Layout under each root:
//! - schemas: `<root>/<vendor>/<package>/<EventName>.json`, or
//!   `<root>/<EventName>.json` for bare events
//! - packages: `<root>/<vendor>/<package>.json`
//! - index: `<root>/<index>/<type>.jsonl`, one stored document per line

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use esp_core::{EventSchema, PackageConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::*;

/// Read and decode a JSON document, mapping a missing file to `None`.
///
/// Documents are decoded from text so that map key order survives.
async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StorageError::Malformed {
            location: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Join `/`-separated `name` under `root`, refusing anything that could
/// escape it.
fn nested_path(root: &Path, name: &str, extension: &str) -> StorageResult<PathBuf> {
    let mut path = root.to_path_buf();
    let parts: Vec<&str> = name.split('/').collect();
    for part in &parts {
        if !is_safe_component(part) {
            return Err(StorageError::InvalidName {
                name: name.to_string(),
            });
        }
    }
    for (i, part) in parts.iter().enumerate() {
        if i + 1 == parts.len() {
            path.push(format!("{part}.{extension}"));
        } else {
            path.push(part);
        }
    }
    Ok(path)
}

fn is_safe_component(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && !part.contains(['/', '\\'])
        && !part.starts_with('.')
}

// ---------------------------------------------------------------------------
// FsSchemaRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsSchemaRegistry {
    root: PathBuf,
}

impl FsSchemaRegistry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Write `schema` where `lookup` will find it.
    pub async fn store(
        &self,
        package: Option<&str>,
        event_name: &str,
        schema: &EventSchema,
    ) -> StorageResult<()> {
        let path = self.schema_path(package, event_name)?;
        write_json(&path, schema).await
    }

    fn schema_path(&self, package: Option<&str>, event_name: &str) -> StorageResult<PathBuf> {
        let name = match package {
            Some(package) => format!("{package}/{event_name}"),
            None => event_name.to_string(),
        };
        nested_path(&self.root, &name, "json")
    }
}

#[async_trait]
impl SchemaRegistry for FsSchemaRegistry {
    async fn lookup(
        &self,
        package: Option<&str>,
        event_name: &str,
    ) -> StorageResult<Option<EventSchema>> {
        let path = self.schema_path(package, event_name)?;
        debug!(path = %path.display(), "loading schema");
        read_json(&path).await
    }
}

// ---------------------------------------------------------------------------
// FsPackageRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsPackageRegistry {
    root: PathBuf,
}

impl FsPackageRegistry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub async fn store(&self, package: &str, config: &PackageConfig) -> StorageResult<()> {
        let path = nested_path(&self.root, package, "json")?;
        write_json(&path, config).await
    }
}

#[async_trait]
impl PackageRegistry for FsPackageRegistry {
    async fn lookup(&self, package: &str) -> StorageResult<Option<PackageConfig>> {
        let path = nested_path(&self.root, package, "json")?;
        debug!(path = %path.display(), "loading package configuration");
        read_json(&path).await
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| StorageError::io(path, e))
}

// ---------------------------------------------------------------------------
// FsIndexSink
// ---------------------------------------------------------------------------

/// Line format of the JSONL index files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
}

/// Append-only JSONL sink.
#[derive(Debug, Clone)]
pub struct FsIndexSink {
    root: PathBuf,
}

impl FsIndexSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn file_path(&self, index: &str, type_name: &str) -> StorageResult<PathBuf> {
        for name in [index, type_name] {
            if !is_safe_component(name) {
                return Err(StorageError::InvalidName {
                    name: name.to_string(),
                });
            }
        }
        Ok(self.root.join(index).join(format!("{type_name}.jsonl")))
    }

    /// Every document stored under `index`/`type_name`, oldest first.
    pub async fn documents(
        &self,
        index: &str,
        type_name: &str,
    ) -> StorageResult<Vec<StoredDocument>> {
        let path = self.file_path(index, type_name)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| StorageError::Malformed {
                    location: format!("{}:{}", path.display(), n + 1),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl IndexSink for FsIndexSink {
    async fn index(
        &self,
        index: &str,
        type_name: &str,
        document: &Value,
    ) -> StorageResult<Acknowledgement> {
        let path = self.file_path(index, type_name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }

        let stored = StoredDocument {
            id: Uuid::new_v4().to_string(),
            source: document.clone(),
        };
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&path, e))?;

        Ok(Acknowledgement::created(index, type_name, stored.id))
    }
}
