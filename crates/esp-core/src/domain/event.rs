//! Inbound and enriched event records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The inbound payload exactly as submitted.
///
/// Every field is optional at this level so that missing fields surface as
/// client errors with a precise message rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event: Option<String>,

    #[serde(default)]
    pub properties: Option<Value>,

    #[serde(default)]
    pub relationships: Option<Value>,

    /// Client-supplied occurrence time; defaults to the receive time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, properties: Value) -> Self {
        Self {
            event: Some(event.into()),
            properties: Some(properties),
            relationships: None,
            timestamp: None,
        }
    }

    pub fn with_relationships(mut self, relationships: Value) -> Self {
        self.relationships = Some(relationships);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Request-derived context attached to every stored event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Per-group rule outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleResults {
    #[serde(default)]
    pub results: BTreeMap<String, Value>,
}

/// The record that is finally submitted to the indexing sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEvent {
    pub properties: Map<String, Value>,
    pub received_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub context: EventContext,
    pub relationships: Map<String, Value>,
    pub rules: RuleResults,
}

impl EnrichedEvent {
    /// Start an enriched record from schema-filtered properties.
    pub fn new(properties: Map<String, Value>, received_at: DateTime<Utc>) -> Self {
        Self {
            properties,
            received_at,
            timestamp: received_at,
            context: EventContext::default(),
            relationships: Map::new(),
            rules: RuleResults::default(),
        }
    }

    /// Properties as a JSON value, for path resolution and expression scopes.
    pub fn properties_value(&self) -> Value {
        Value::Object(self.properties.clone())
    }

    pub fn relationships_value(&self) -> Value {
        Value::Object(self.relationships.clone())
    }

    /// Result stored for a rule group, if it produced one.
    pub fn rule_result(&self, group: &str) -> Option<&Value> {
        self.rules.results.get(group)
    }
}
