//! Event URI parsing.
//!
//! An event URI is either a bare event name (`Purchase`) or an event name
//! prefixed with the owning package (`acme/shop/Purchase`). Backslashes are
//! accepted as separators and normalized to `/`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::InvalidArgument;

fn uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9_-]*/)*[A-Za-z][A-Za-z0-9_]*$")
            .expect("event URI pattern is valid")
    })
}

/// A validated event identifier split into package and event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventUri {
    package: Option<String>,
    event_name: String,
}

impl EventUri {
    /// Validate and split a single event URI.
    pub fn parse(value: &str) -> Result<Self, InvalidArgument> {
        let normalized = normalize(value);
        if !uri_pattern().is_match(&normalized) {
            return Err(InvalidArgument::EventUriFormat {
                value: value.to_string(),
            });
        }

        let parts: Vec<&str> = normalized.split('/').collect();
        match parts.as_slice() {
            [event] => Ok(Self {
                package: None,
                event_name: (*event).to_string(),
            }),
            [vendor, package, event] => Ok(Self {
                package: Some(format!("{vendor}/{package}")),
                event_name: (*event).to_string(),
            }),
            _ => Err(InvalidArgument::EventUriSegments {
                value: value.to_string(),
                segments: parts.len(),
            }),
        }
    }

    /// Owning package (`vendor/package-name`), absent for bare event names.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl fmt::Display for EventUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{}/{}", package, self.event_name),
            None => write!(f, "{}", self.event_name),
        }
    }
}

impl std::str::FromStr for EventUri {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Validate a comma-joined list of event URIs.
///
/// Every candidate must pass; the first failure rejects the whole batch.
pub fn validate_event_uris(value: &str) -> Result<Vec<EventUri>, InvalidArgument> {
    value.split(',').map(EventUri::parse).collect()
}

fn normalize(value: &str) -> String {
    value.trim().replace('\\', "/")
}
