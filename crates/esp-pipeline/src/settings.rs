//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INDEX_PREFIX: &str = "events";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// First component of every index name.
    pub index_prefix: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
        }
    }
}

impl PipelineSettings {
    pub fn new(index_prefix: impl Into<String>) -> Self {
        Self {
            index_prefix: index_prefix.into(),
        }
    }

    /// `<prefix>.esp.<vendor>.<package>`, or `<prefix>.esp` for bare events.
    pub fn index_name(&self, package: Option<&str>) -> String {
        match package {
            Some(package) => format!("{}.esp.{}", self.index_prefix, package.replace('/', ".")),
            None => format!("{}.esp", self.index_prefix),
        }
    }
}
