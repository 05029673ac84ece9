//! Task execution for a single rule group.
//!
//! Tasks run in declaration order. Each task's `method` expression sees:
//! - `result`: the group's rule result
//! - `service`: the task's service key (calls dispatch to the resolved service)
//! - `properties` and `relationships` of the event
//! - `tasks`: outputs of the tasks that already ran in this group

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::capability::{CapabilityError, CapabilityRegistry, TaskService};
use crate::domain::{EnrichedEvent, OrderedMap, TaskConfig};
use crate::expr::{ExprError, Expression, Scope, SERVICE_VAR};
use crate::obs;

/// A task that could not complete. Carries the location of the failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error("task '{task}' in group '{group}': {source}")]
    Capability {
        group: String,
        task: String,
        #[source]
        source: CapabilityError,
    },

    #[error("task '{task}' in group '{group}' failed evaluating '{expression}': {source}")]
    Expression {
        group: String,
        task: String,
        expression: String,
        #[source]
        source: ExprError,
    },
}

impl TaskError {
    pub fn task(&self) -> &str {
        match self {
            TaskError::Capability { task, .. } | TaskError::Expression { task, .. } => task,
        }
    }

    /// The expression text, when the failure happened while evaluating one.
    pub fn expression(&self) -> Option<&str> {
        match self {
            TaskError::Expression { expression, .. } => Some(expression),
            TaskError::Capability { .. } => None,
        }
    }
}

/// Outputs of the tasks that ran, plus the failure that stopped the group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRun {
    pub outputs: OrderedMap<Value>,
    pub error: Option<TaskError>,
}

impl TaskRun {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Sequences a rule group's tasks and assembles their bindings.
pub struct TaskExecutor<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Run `tasks` for `group`. The first failure abandons the remaining tasks.
    pub fn run(
        &self,
        group: &str,
        tasks: &OrderedMap<TaskConfig>,
        result: &Value,
        event: &EnrichedEvent,
    ) -> TaskRun {
        let properties = event.properties_value();
        let relationships = event.relationships_value();
        let mut run = TaskRun::default();

        for (name, task) in tasks.iter() {
            match self.run_one(group, name, task, result, &properties, &relationships, &run.outputs)
            {
                Ok(output) => {
                    obs::emit_task_completed(group, name);
                    run.outputs.insert(name, output);
                }
                Err(err) => {
                    run.error = Some(err);
                    break;
                }
            }
        }

        run
    }

    #[allow(clippy::too_many_arguments)]
    fn run_one(
        &self,
        group: &str,
        name: &str,
        task: &TaskConfig,
        result: &Value,
        properties: &Value,
        relationships: &Value,
        completed: &OrderedMap<Value>,
    ) -> Result<Value, TaskError> {
        let service: Option<Arc<dyn TaskService>> = task
            .service
            .as_deref()
            .map(|key| self.registry.resolve_service(key))
            .transpose()
            .map_err(|source| TaskError::Capability {
                group: group.to_string(),
                task: name.to_string(),
                source,
            })?;

        let expression_error = |source: ExprError| TaskError::Expression {
            group: group.to_string(),
            task: name.to_string(),
            expression: task.method.clone(),
            source,
        };

        let expression = Expression::parse(&task.method).map_err(expression_error)?;

        let service_key = task
            .service
            .as_ref()
            .map_or(Value::Null, |key| Value::String(key.clone()));
        let prior: Map<String, Value> = completed
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let prior = Value::Object(prior);

        let mut scope = Scope::new()
            .bind("result", result)
            .bind(SERVICE_VAR, &service_key)
            .bind("properties", properties)
            .bind("relationships", relationships)
            .bind("tasks", &prior);
        if let Some(service) = service.as_deref() {
            scope = scope.with_service(service);
        }

        expression.evaluate(&scope).map_err(expression_error)
    }
}
