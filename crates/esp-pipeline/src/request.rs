//! Inbound requests and outbound responses.

use esp_core::RawEvent;
use esp_store::Acknowledgement;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A request body plus the transport-level context that accompanies it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestRequest {
    pub body: RawEvent,
    pub ip: Option<String>,
    pub locale: Option<String>,
}

impl IngestRequest {
    pub fn new(body: RawEvent) -> Self {
        Self {
            body,
            ip: None,
            locale: None,
        }
    }

    /// Decode a JSON request body. Decoding failures are client errors.
    pub fn from_json(body: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(body)
            .map(Self::new)
            .map_err(|e| PipelineError::MalformedRequest(e.to_string()))
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
}

/// What the caller receives: the sink's acknowledgement, or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestResponse {
    Acknowledged(Acknowledgement),
    Error { error: ErrorBody },
}

impl IngestResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestResponse::Acknowledged(_))
    }

    /// HTTP-equivalent status: 201 for an indexed document, else the error code.
    pub fn status(&self) -> u16 {
        match self {
            IngestResponse::Acknowledged(_) => 201,
            IngestResponse::Error { error } => error.code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_accepts_optional_fields() {
        let request = IngestRequest::from_json(
            r#"{"event": "acme/shop/Purchase", "properties": {"amount": 42},
                "relationships": {"customer": {"id": 7}},
                "timestamp": "2017-10-09T13:13:13Z"}"#,
        )
        .unwrap();
        assert_eq!(request.body.event.as_deref(), Some("acme/shop/Purchase"));
        assert_eq!(request.body.properties, Some(json!({"amount": 42})));
        assert!(request.body.timestamp.is_some());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = IngestRequest::from_json("{\"event\": ").unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_acknowledged_serializes_flat() {
        let response =
            IngestResponse::Acknowledged(Acknowledgement::created("events.esp", "Ping", "1"));
        assert_eq!(response.status(), 201);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"_index": "events.esp", "_type": "Ping", "_id": "1", "_version": 1, "result": "created"})
        );
    }
}
