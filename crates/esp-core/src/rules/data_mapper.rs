//! Property mapping: copy values from source paths to target paths.

use serde_json::{Map, Value};

use super::RuleError;
use crate::capability::RuleCapability;
use crate::domain::{is_blank, EnrichedEvent, InvalidArgument, OrderedMap, PropertyPath};

/// Project values of `data` into a new object.
///
/// Each source path that resolves to a non-blank value is written to every
/// listed target path. Every path is validated before anything is written,
/// so one bad path fails the whole call.
pub fn map_properties(
    data: &Value,
    criteria: &OrderedMap<Vec<String>>,
) -> Result<Value, InvalidArgument> {
    let plan = criteria
        .iter()
        .map(|(source, targets)| {
            let targets = targets
                .iter()
                .map(|t| PropertyPath::parse(t))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((PropertyPath::parse(source)?, targets))
        })
        .collect::<Result<Vec<_>, InvalidArgument>>()?;

    let mut result = Value::Object(Map::new());
    for (source, targets) in plan {
        let Some(value) = source.get(data).filter(|v| !is_blank(v)) else {
            continue;
        };
        for target in &targets {
            target.set(&mut result, value.clone());
        }
    }
    Ok(result)
}

/// Rule capability (`data_mapper`) whose result is the mapped object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataMapper;

impl RuleCapability for DataMapper {
    fn execute(
        &self,
        event: &EnrichedEvent,
        criteria: &OrderedMap<Vec<String>>,
    ) -> Result<Value, RuleError> {
        Ok(map_properties(&event.properties_value(), criteria)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn criteria(entries: &[(&str, &[&str])]) -> OrderedMap<Vec<String>> {
        entries
            .iter()
            .map(|(path, targets)| (*path, targets.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_absent_source_writes_nothing() {
        let mapping = criteria(&[(r#"["a"]"#, &[r#"["b"]"#])]);
        assert_eq!(map_properties(&json!({}), &mapping).unwrap(), json!({}));
    }

    #[test]
    fn test_fans_out_to_every_target() {
        let mapping = criteria(&[("['email']", &["['contact']['email']", "['login']"])]);
        let result = map_properties(&json!({"email": "a@b.c"}), &mapping).unwrap();
        assert_eq!(
            result,
            json!({"contact": {"email": "a@b.c"}, "login": "a@b.c"})
        );
    }

    #[test]
    fn test_blank_skipped_but_zero_and_false_mapped() {
        let mapping = criteria(&[
            ("['empty']", &["['e']"]),
            ("['nothing']", &["['n']"]),
            ("['zero']", &["['z']"]),
            ("['off']", &["['f']"]),
        ]);
        let data = json!({"empty": "", "nothing": null, "zero": 0, "off": false});
        assert_eq!(
            map_properties(&data, &mapping).unwrap(),
            json!({"z": 0, "f": false})
        );
    }

    #[test]
    fn test_index_targets_pad_with_null() {
        let mapping = criteria(&[("['id']", &["['ids'][2]"])]);
        let result = map_properties(&json!({"id": 7}), &mapping).unwrap();
        assert_eq!(result, json!({"ids": [null, null, 7]}));
    }

    #[test]
    fn test_huge_index_target_is_rejected() {
        for target in ["['x'][18446744073709551615]", "['x'][4000000000]"] {
            let mapping = criteria(&[("['a']", &[target])]);
            assert_eq!(
                map_properties(&json!({"a": 1}), &mapping),
                Err(InvalidArgument::PropertyPath {
                    value: target.to_string()
                })
            );
        }
    }

    #[test]
    fn test_invalid_target_fails_whole_call() {
        let mapping = criteria(&[
            ("['a']", &["['x']"]),
            ("['b']", &["not a path"]),
        ]);
        let err = map_properties(&json!({"a": 1, "b": 2}), &mapping).unwrap_err();
        assert_eq!(
            err,
            InvalidArgument::PropertyPath {
                value: "not a path".to_string()
            }
        );
    }

    #[test]
    fn test_capability_reads_event_properties() {
        use chrono::{TimeZone, Utc};

        let props = json!({"name": "Ada"});
        let event = EnrichedEvent::new(
            props.as_object().cloned().unwrap_or_default(),
            Utc.with_ymd_and_hms(2017, 10, 9, 13, 13, 13).unwrap(),
        );
        let mapping = criteria(&[("['name']", &["['user']['first']"])]);
        assert_eq!(
            DataMapper.execute(&event, &mapping).unwrap(),
            json!({"user": {"first": "Ada"}})
        );
    }
}
