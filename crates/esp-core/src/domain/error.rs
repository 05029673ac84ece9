//! Domain-level error taxonomy for ESP.

/// Rejected identifiers: event URIs and property paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    #[error(
        "not a valid event URI '{value}': it should be in the format \
         \"[vendor-name]/[package-name]/[EventName]\" or just \"[EventName]\""
    )]
    EventUriFormat { value: String },

    #[error(
        "the event URI '{value}' is not correct: it should consist of either just the \
         event name or the event name prefixed with a package name (got {segments} segments)"
    )]
    EventUriSegments { value: String, segments: usize },

    #[error(
        "not a valid property path '{value}': it should be for example ['my']['property']['path']"
    )]
    PropertyPath { value: String },
}

/// Errors produced while filtering properties through an event schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("none of the properties match the schema for event '{event}'")]
    EmptyResult { event: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_format_error_mentions_expected_shape() {
        let err = InvalidArgument::EventUriFormat {
            value: "9bad".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("9bad"));
        assert!(msg.contains("[vendor-name]/[package-name]/[EventName]"));
    }

    #[test]
    fn test_segment_error_reports_count() {
        let err = InvalidArgument::EventUriSegments {
            value: "acme/BadEvent".to_string(),
            segments: 2,
        };
        assert!(err.to_string().contains("2 segments"));
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = SchemaError::TypeMismatch {
            field: "amount".to_string(),
            expected: "number".to_string(),
            found: "string".to_string(),
        };
        assert_eq!(err.to_string(), "field 'amount' expects number, got string");
    }
}
