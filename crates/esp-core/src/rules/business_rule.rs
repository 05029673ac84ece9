//! Credit scoring: first non-zero expression per property path wins.

use serde_json::Value;
use tracing::debug;

use super::{to_credit, RuleError};
use crate::capability::RuleCapability;
use crate::domain::{is_empty, EnrichedEvent, OrderedMap, PropertyPath};
use crate::expr::{Expression, Scope};

/// Score `criteria` against `properties`.
///
/// For every path whose value resolves and is not empty, the path's
/// expressions run in declared order with `value` and `relationships`
/// bound. The first expression yielding a non-zero credit is added to the
/// total and the rest of that path's expressions are skipped. Zero results
/// do not stop the scan.
pub fn score(
    properties: &Value,
    relationships: &Value,
    criteria: &OrderedMap<Vec<String>>,
) -> Result<i64, RuleError> {
    let mut total: i64 = 0;

    for (raw_path, expressions) in criteria.iter() {
        let path = PropertyPath::parse(raw_path)?;
        let value = match path.get(properties) {
            Some(v) if !is_empty(v) => v,
            _ => {
                debug!(path = %path, "skipping empty property");
                continue;
            }
        };

        let scope = Scope::new()
            .bind("value", value)
            .bind("relationships", relationships);

        for source in expressions {
            let credit = Expression::parse(source)
                .and_then(|expr| expr.evaluate(&scope))
                .map(|result| to_credit(&result))
                .map_err(|source_err| RuleError::Expression {
                    path: path.to_string(),
                    expression: source.clone(),
                    source: source_err,
                })?;

            if credit != 0 {
                total = total.saturating_add(credit);
                break;
            }
        }
    }

    Ok(total)
}

/// The default rule capability (`business_rule`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessRule;

impl RuleCapability for BusinessRule {
    fn execute(
        &self,
        event: &EnrichedEvent,
        criteria: &OrderedMap<Vec<String>>,
    ) -> Result<Value, RuleError> {
        let credit = score(
            &event.properties_value(),
            &event.relationships_value(),
            criteria,
        )?;
        Ok(Value::from(credit))
    }
}
