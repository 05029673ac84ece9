//! Terminal pipeline failures and their response codes.

use esp_core::{CapabilityError, InvalidArgument, SchemaError};
use esp_store::StorageError;
use thiserror::Error;

use crate::request::{ErrorBody, IngestResponse};

/// A failure that ends a run in the `Errored` state. Nothing is persisted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event name not defined")]
    EventNotDefined,

    #[error("properties not defined")]
    PropertiesNotDefined,

    #[error("properties data is empty")]
    PropertiesEmpty,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    InvalidUri(#[from] InvalidArgument),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("schema for event \"{event}\" does not exist in package \"{}\"", .package.as_deref().unwrap_or("-"))]
    SchemaNotFound {
        package: Option<String>,
        event: String,
    },

    #[error("configuration lookup failed: {0}")]
    Registry(#[source] StorageError),

    #[error(transparent)]
    Configuration(#[from] CapabilityError),

    #[error("ESP manager '{manager}' failed: {message}")]
    Manager { manager: String, message: String },

    #[error("could not encode the enriched event: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("indexing failed: {0}")]
    Sink(#[source] StorageError),
}

impl PipelineError {
    /// HTTP-equivalent status code.
    pub fn code(&self) -> u16 {
        match self {
            PipelineError::EventNotDefined
            | PipelineError::PropertiesNotDefined
            | PipelineError::PropertiesEmpty
            | PipelineError::MalformedRequest(_)
            | PipelineError::InvalidUri(_)
            | PipelineError::Schema(_) => 400,
            PipelineError::SchemaNotFound { .. } => 404,
            PipelineError::Registry(_)
            | PipelineError::Configuration(_)
            | PipelineError::Manager { .. }
            | PipelineError::Encoding(_) => 500,
            PipelineError::Sink(_) => 502,
        }
    }

    /// Error category, as it appears in logs.
    pub fn kind(&self) -> &'static str {
        match self.code() {
            400 => "client_input",
            404 => "schema_not_found",
            502 => "sink",
            _ => match self {
                PipelineError::Manager { .. } => "capability",
                _ => "configuration",
            },
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    /// The structured `{error: {message, code}}` response.
    pub fn to_response(&self) -> IngestResponse {
        IngestResponse::Error {
            error: ErrorBody {
                message: self.to_string(),
                code: self.code(),
            },
        }
    }
}
