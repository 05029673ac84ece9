//! Built-in rule capabilities.

pub mod business_rule;
pub mod data_mapper;

use serde_json::Value;
use thiserror::Error;

use crate::domain::InvalidArgument;
use crate::expr::ExprError;

pub use business_rule::{score, BusinessRule};
pub use data_mapper::{map_properties, DataMapper};

/// Failure while computing a rule group's result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    #[error("expression '{expression}' for {path} failed: {source}")]
    Expression {
        path: String,
        expression: String,
        #[source]
        source: ExprError,
    },

    /// Raised by externally registered rule capabilities.
    #[error("{0}")]
    Capability(String),
}

/// Convert an expression result into integer credit.
///
/// Booleans count as 1/0, numbers truncate toward zero, numeric strings are
/// parsed, anything else is worth nothing.
pub fn to_credit(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().map_or(0, |f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Value::Null | Value::Array(_) | Value::Object(_) => 0,
    }
}
