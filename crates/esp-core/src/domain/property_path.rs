//! Bracketed property paths and generic traversal over JSON values.
//!
//! A path is one or more segments such as `['data'][0]['id']`. Quoted
//! segments address mapping keys, unquoted integers address sequence
//! positions. The whole string must be made of segments.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::InvalidArgument;

/// Largest sequence position a path may address. Writing through a path
/// pads the sequence up to its index, so the index bounds the allocation.
pub const MAX_PATH_INDEX: usize = 10_000;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"\['([A-Za-z][A-Za-z0-9_-]*)'\]|\["([A-Za-z][A-Za-z0-9_-]*)"\]|\[([0-9]+)\]"#,
        )
        .expect("property path pattern is valid")
    })
}

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "['{key}']"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A validated property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<Segment>,
}

impl PropertyPath {
    /// Parse a bracketed path, rejecting anything that is not entirely
    /// composed of well-formed segments.
    pub fn parse(value: &str) -> Result<Self, InvalidArgument> {
        let invalid = || InvalidArgument::PropertyPath {
            value: value.to_string(),
        };

        let mut segments = Vec::new();
        let mut cursor = 0;
        for caps in segment_pattern().captures_iter(value) {
            let whole = caps.get(0).ok_or_else(invalid)?;
            if whole.start() != cursor {
                return Err(invalid());
            }
            cursor = whole.end();

            let segment = if let Some(key) = caps.get(1).or_else(|| caps.get(2)) {
                Segment::Key(key.as_str().to_string())
            } else {
                let digits = caps.get(3).ok_or_else(invalid)?;
                let index: usize = digits.as_str().parse().map_err(|_| invalid())?;
                if index > MAX_PATH_INDEX {
                    return Err(invalid());
                }
                Segment::Index(index)
            };
            segments.push(segment);
        }

        if segments.is_empty() || cursor != value.len() {
            return Err(invalid());
        }

        Ok(Self {
            raw: value.to_string(),
            segments,
        })
    }

    /// The path exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve the path inside `root`, returning `None` when any step is missing.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
                _ => None,
            })
    }

    /// Write `value` at the path inside `root`, creating intermediate
    /// containers as needed. Scalars in the way are replaced.
    pub fn set(&self, root: &mut Value, value: Value) {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                        _ => unreachable!("container was just made an object"),
                    }
                }
                Segment::Index(index) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    match current {
                        Value::Array(items) => {
                            if items.len() <= *index {
                                items.resize(*index + 1, Value::Null);
                            }
                            &mut items[*index]
                        }
                        _ => unreachable!("container was just made an array"),
                    }
                }
            };
        }
        *current = value;
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for PropertyPath {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Loose truthiness: `null`, `false`, `0`, `""`, `"0"` and empty
/// collections are empty.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Blank values carry no data: `null`, `""` and empty collections.
/// Unlike [`is_empty`], `0` and `false` are not blank.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
