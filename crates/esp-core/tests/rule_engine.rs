//! Rule capabilities resolved through the registry, driven by parsed
//! package configuration.

use chrono::{TimeZone, Utc};
use esp_core::{
    CapabilityRegistry, EnrichedEvent, PackageConfig, RuleError, TaskExecutor, BUSINESS_RULE,
    DATA_MAPPER,
};
use serde_json::{json, Map, Value};

const PACKAGE: &str = r#"{
    "events": {
        "Purchase": {
            "rules": {
                "loyalty": {
                    "criteria": {
                        "['x']": ["value > 3 ? 2 : 0"],
                        "['y']": ["value > 3 ? 1 : 0"]
                    },
                    "tasks": {
                        "bonus": {"method": "result * 10"},
                        "announce": {"service": "log", "method": "service.info('bonus', tasks.bonus)"}
                    }
                },
                "profile": {
                    "rule": {"service": "data_mapper"},
                    "criteria": {
                        "['email']": ["['contact']['email']"],
                        "['phone']": ["['contact']['phone']"]
                    }
                }
            }
        }
    }
}"#;

fn event(properties: Value) -> EnrichedEvent {
    let properties: Map<String, Value> = properties.as_object().cloned().unwrap_or_default();
    EnrichedEvent::new(
        properties,
        Utc.with_ymd_and_hms(2017, 10, 9, 13, 13, 13).unwrap(),
    )
}

#[test]
fn groups_keep_declaration_order_and_rule_defaults() {
    let config: PackageConfig = serde_json::from_str(PACKAGE).unwrap();
    let groups = config.rule_groups("Purchase").unwrap();

    assert_eq!(groups.keys().collect::<Vec<_>>(), ["loyalty", "profile"]);
    assert_eq!(groups.get("loyalty").unwrap().rule.service, BUSINESS_RULE);
    assert_eq!(groups.get("profile").unwrap().rule.service, DATA_MAPPER);
    assert!(config.rule_groups("Refund").is_none());
}

#[test]
fn scoring_then_tasks_from_configuration() {
    let config: PackageConfig = serde_json::from_str(PACKAGE).unwrap();
    let registry = CapabilityRegistry::with_builtins();
    let loyalty = config.rule_groups("Purchase").unwrap().get("loyalty").unwrap();
    let event = event(json!({"x": 5, "y": 10, "email": "a@b.c"}));

    let result = registry
        .resolve_rule(&loyalty.rule.service)
        .unwrap()
        .execute(&event, &loyalty.criteria)
        .unwrap();
    assert_eq!(result, json!(3));

    let run = TaskExecutor::new(&registry).run("loyalty", &loyalty.tasks, &result, &event);
    assert!(run.is_complete());
    assert_eq!(run.outputs.get("bonus"), Some(&json!(30)));
    assert_eq!(run.outputs.get("announce"), Some(&json!(["bonus", 30])));
}

#[test]
fn mapper_group_returns_an_object() {
    let config: PackageConfig = serde_json::from_str(PACKAGE).unwrap();
    let registry = CapabilityRegistry::with_builtins();
    let profile = config.rule_groups("Purchase").unwrap().get("profile").unwrap();
    let event = event(json!({"email": "a@b.c", "phone": ""}));

    let result = registry
        .resolve_rule(&profile.rule.service)
        .unwrap()
        .execute(&event, &profile.criteria)
        .unwrap();
    assert_eq!(result, json!({"contact": {"email": "a@b.c"}}));
}

#[test]
fn bad_expression_reports_its_location() {
    let config: PackageConfig = serde_json::from_str(
        r#"{"events": {"Purchase": {"rules": {"g": {"criteria": {"['x']": ["value >"]}}}}}}"#,
    )
    .unwrap();
    let registry = CapabilityRegistry::with_builtins();
    let group = config.rule_groups("Purchase").unwrap().get("g").unwrap();

    let err = registry
        .resolve_rule(BUSINESS_RULE)
        .unwrap()
        .execute(&event(json!({"x": 1})), &group.criteria)
        .unwrap_err();
    match err {
        RuleError::Expression {
            path, expression, ..
        } => {
            assert_eq!(path, "['x']");
            assert_eq!(expression, "value >");
        }
        other => panic!("unexpected error: {other}"),
    }
}
