//! Per-rule-group execution with failure isolation.

use esp_core::{
    obs, CapabilityError, CapabilityRegistry, EnrichedEvent, OrderedMap, RuleError,
    RuleGroupConfig, TaskExecutor,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task outputs per rule group, each in task declaration order.
pub type TaskOutputs = OrderedMap<OrderedMap<Value>>;

/// Which phase an isolated failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Rules,
    Tasks,
}

/// A rule group that failed without ending the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFailure {
    pub group: String,
    pub phase: FailurePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub message: String,
}

/// Runs an event's rule groups, then their tasks.
pub struct GroupRunner<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> GroupRunner<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Resolve every capability the groups and the package manager refer to.
    ///
    /// Runs before any rule so that a misconfigured package fails the request
    /// instead of being isolated as a group failure.
    pub fn preflight(
        &self,
        groups: &OrderedMap<RuleGroupConfig>,
        manager: Option<&str>,
    ) -> Result<(), CapabilityError> {
        for (_, group) in groups.iter() {
            self.registry.resolve_rule(&group.rule.service)?;
            for (_, task) in group.tasks.iter() {
                if let Some(service) = task.service.as_deref() {
                    self.registry.resolve_service(service)?;
                }
            }
        }
        if let Some(manager) = manager {
            self.registry.resolve_manager(manager)?;
        }
        Ok(())
    }

    /// Score each group in declaration order and store its result on `event`.
    ///
    /// A failing group gets no result; the remaining groups still run.
    pub fn evaluate_rules(
        &self,
        groups: &OrderedMap<RuleGroupConfig>,
        event: &mut EnrichedEvent,
    ) -> Vec<GroupFailure> {
        let mut failures = Vec::new();

        for (name, group) in groups.iter() {
            let outcome = self
                .registry
                .resolve_rule(&group.rule.service)
                .map_err(|e| RuleError::Capability(e.to_string()))
                .and_then(|rule| rule.execute(&*event, &group.criteria));

            match outcome {
                Ok(result) => {
                    obs::emit_rule_group_scored(name, &group.rule.service, &result);
                    event.rules.results.insert(name.to_string(), result);
                }
                Err(err) => {
                    let expression = match &err {
                        RuleError::Expression { expression, .. } => Some(expression.clone()),
                        _ => None,
                    };
                    obs::emit_group_failed(name, None, expression.as_deref(), &err);
                    failures.push(GroupFailure {
                        group: name.to_string(),
                        phase: FailurePhase::Rules,
                        task: None,
                        expression,
                        message: err.to_string(),
                    });
                }
            }
        }

        failures
    }

    /// Run each scored group's tasks against the group's result.
    ///
    /// Groups without a result are skipped. A failing task abandons the rest
    /// of its group; outputs produced before the failure are kept.
    pub fn execute_tasks(
        &self,
        groups: &OrderedMap<RuleGroupConfig>,
        event: &EnrichedEvent,
    ) -> (TaskOutputs, Vec<GroupFailure>) {
        let executor = TaskExecutor::new(self.registry);
        let mut outputs = TaskOutputs::new();
        let mut failures = Vec::new();

        for (name, group) in groups.iter() {
            if group.tasks.is_empty() {
                continue;
            }
            let Some(result) = event.rule_result(name) else {
                tracing::debug!(group = %name, "skipping tasks of unscored group");
                continue;
            };

            let run = executor.run(name, &group.tasks, result, event);
            if let Some(err) = &run.error {
                obs::emit_group_failed(name, Some(err.task()), err.expression(), err);
                failures.push(GroupFailure {
                    group: name.to_string(),
                    phase: FailurePhase::Tasks,
                    task: Some(err.task().to_string()),
                    expression: err.expression().map(str::to_string),
                    message: err.to_string(),
                });
            }
            outputs.insert(name, run.outputs);
        }

        (outputs, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use esp_core::CapabilityKind;
    use serde_json::json;

    fn groups(config: &str) -> OrderedMap<RuleGroupConfig> {
        serde_json::from_str(config).unwrap()
    }

    fn event() -> EnrichedEvent {
        let properties = json!({"amount": 42, "email": "a@b.c"});
        EnrichedEvent::new(
            properties.as_object().cloned().unwrap_or_default(),
            Utc.with_ymd_and_hms(2017, 10, 9, 13, 13, 13).unwrap(),
        )
    }

    #[test]
    fn test_preflight_reports_unknown_capabilities() {
        let registry = CapabilityRegistry::with_builtins();
        let runner = GroupRunner::new(&registry);

        let unknown_rule = groups(r#"{"g": {"rule": {"service": "nope"}}}"#);
        assert_eq!(
            runner.preflight(&unknown_rule, None),
            Err(CapabilityError::Unknown {
                kind: CapabilityKind::Rule,
                key: "nope".to_string(),
            })
        );

        let unknown_service =
            groups(r#"{"g": {"tasks": {"t": {"service": "mailer", "method": "1"}}}}"#);
        assert!(runner.preflight(&unknown_service, None).is_err());

        let fine = groups(r#"{"g": {"tasks": {"t": {"service": "log", "method": "1"}}}}"#);
        assert!(runner.preflight(&fine, None).is_ok());
        assert!(matches!(
            runner.preflight(&fine, Some("shop_manager")),
            Err(CapabilityError::Unknown { kind: CapabilityKind::Manager, .. })
        ));
    }

    #[test]
    fn test_rule_failure_is_isolated() {
        let registry = CapabilityRegistry::with_builtins();
        let runner = GroupRunner::new(&registry);
        let config = groups(
            r#"{
                "broken": {"criteria": {"['amount']": ["value / 0"]}},
                "loyalty": {"criteria": {"['amount']": ["value > 40 ? 5 : 0"]}}
            }"#,
        );

        let mut event = event();
        let failures = runner.evaluate_rules(&config, &mut event);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].group, "broken");
        assert_eq!(failures[0].phase, FailurePhase::Rules);
        assert_eq!(failures[0].expression.as_deref(), Some("value / 0"));
        assert!(event.rule_result("broken").is_none());
        assert_eq!(event.rule_result("loyalty"), Some(&json!(5)));
    }

    #[test]
    fn test_tasks_skip_unscored_groups_and_keep_partial_outputs() {
        let registry = CapabilityRegistry::with_builtins();
        let runner = GroupRunner::new(&registry);
        let config = groups(
            r#"{
                "a": {
                    "criteria": {"['amount']": ["1"]},
                    "tasks": {"first": {"method": "result + 1"}, "bad": {"method": "missing"}}
                },
                "b": {
                    "criteria": {"['amount']": ["value / 0"]},
                    "tasks": {"never": {"method": "1"}}
                },
                "c": {
                    "criteria": {"['amount']": ["2"]},
                    "tasks": {"echo": {"service": "log", "method": "service.info(result)"}}
                }
            }"#,
        );

        let mut event = event();
        let rule_failures = runner.evaluate_rules(&config, &mut event);
        assert_eq!(rule_failures.len(), 1);

        let (outputs, failures) = runner.execute_tasks(&config, &event);
        assert_eq!(outputs.keys().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(outputs.get("a").and_then(|o| o.get("first")), Some(&json!(2)));
        assert!(outputs.get("a").and_then(|o| o.get("bad")).is_none());
        assert_eq!(outputs.get("c").and_then(|o| o.get("echo")), Some(&json!([2])));

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].group, "a");
        assert_eq!(failures[0].phase, FailurePhase::Tasks);
        assert_eq!(failures[0].task.as_deref(), Some("bad"));
    }

    #[test]
    fn test_failure_serializes_without_empty_location() {
        let failure = GroupFailure {
            group: "g".to_string(),
            phase: FailurePhase::Rules,
            task: None,
            expression: None,
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"group": "g", "phase": "rules", "message": "boom"})
        );
    }
}
