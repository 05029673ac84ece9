//! Capability registry: rule evaluators, ESP managers and task services.
//!
//! Configuration refers to capabilities by stable string keys. The registry
//! is populated once at startup and shared read-only by every request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::domain::{EnrichedEvent, OrderedMap, BUSINESS_RULE, DATA_MAPPER};
use crate::rules::{BusinessRule, DataMapper, RuleError};

/// Key of the built-in task service that logs its arguments.
pub const LOG_SERVICE: &str = "log";

/// Scores (or otherwise derives a result for) one rule group.
pub trait RuleCapability: Send + Sync {
    fn execute(
        &self,
        event: &EnrichedEvent,
        criteria: &OrderedMap<Vec<String>>,
    ) -> Result<Value, RuleError>;
}

/// Package-level post-processing of an event's properties.
pub trait EspManager: Send + Sync {
    fn detach_event(
        &self,
        event_name: &str,
        properties: Map<String, Value>,
    ) -> std::result::Result<Map<String, Value>, String>;
}

/// Side-effecting service reachable from task expressions as `service.method(...)`.
pub trait TaskService: Send + Sync {
    fn call(&self, method: &str, args: &[Value]) -> std::result::Result<Value, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Rule,
    Manager,
    TaskService,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityKind::Rule => "rule capability",
            CapabilityKind::Manager => "ESP manager",
            CapabilityKind::TaskService => "task service",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("duplicate {kind} registration: {key}")]
    Duplicate { kind: CapabilityKind, key: String },

    #[error("unknown {kind} '{key}'")]
    Unknown { kind: CapabilityKind, key: String },
}

/// Keyed tables of constructed capability instances.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    rules: HashMap<String, Arc<dyn RuleCapability>>,
    managers: HashMap<String, Arc<dyn EspManager>>,
    services: HashMap<String, Arc<dyn TaskService>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `business_rule`, `data_mapper` and the `log` task service.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .rules
            .insert(BUSINESS_RULE.to_string(), Arc::new(BusinessRule));
        registry
            .rules
            .insert(DATA_MAPPER.to_string(), Arc::new(DataMapper));
        registry
            .services
            .insert(LOG_SERVICE.to_string(), Arc::new(LogService));
        registry
    }

    pub fn register_rule(
        &mut self,
        key: impl Into<String>,
        rule: impl RuleCapability + 'static,
    ) -> Result<(), CapabilityError> {
        let rule: Arc<dyn RuleCapability> = Arc::new(rule);
        insert_unique(&mut self.rules, CapabilityKind::Rule, key.into(), rule)
    }

    pub fn register_manager(
        &mut self,
        key: impl Into<String>,
        manager: impl EspManager + 'static,
    ) -> Result<(), CapabilityError> {
        let manager: Arc<dyn EspManager> = Arc::new(manager);
        insert_unique(&mut self.managers, CapabilityKind::Manager, key.into(), manager)
    }

    pub fn register_service(
        &mut self,
        key: impl Into<String>,
        service: impl TaskService + 'static,
    ) -> Result<(), CapabilityError> {
        let service: Arc<dyn TaskService> = Arc::new(service);
        insert_unique(&mut self.services, CapabilityKind::TaskService, key.into(), service)
    }

    pub fn resolve_rule(&self, key: &str) -> Result<Arc<dyn RuleCapability>, CapabilityError> {
        resolve(&self.rules, CapabilityKind::Rule, key)
    }

    pub fn resolve_manager(&self, key: &str) -> Result<Arc<dyn EspManager>, CapabilityError> {
        resolve(&self.managers, CapabilityKind::Manager, key)
    }

    pub fn resolve_service(&self, key: &str) -> Result<Arc<dyn TaskService>, CapabilityError> {
        resolve(&self.services, CapabilityKind::TaskService, key)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sorted<'a>(mut keys: Vec<&'a String>) -> Vec<&'a String> {
            keys.sort();
            keys
        }
        f.debug_struct("CapabilityRegistry")
            .field("rules", &sorted(self.rules.keys().collect()))
            .field("managers", &sorted(self.managers.keys().collect()))
            .field("services", &sorted(self.services.keys().collect()))
            .finish()
    }
}

fn insert_unique<T: ?Sized>(
    table: &mut HashMap<String, Arc<T>>,
    kind: CapabilityKind,
    key: String,
    value: Arc<T>,
) -> Result<(), CapabilityError> {
    if table.contains_key(&key) {
        return Err(CapabilityError::Duplicate { kind, key });
    }
    table.insert(key, value);
    Ok(())
}

fn resolve<T: ?Sized>(
    table: &HashMap<String, Arc<T>>,
    kind: CapabilityKind,
    key: &str,
) -> Result<Arc<T>, CapabilityError> {
    table
        .get(key)
        .cloned()
        .ok_or_else(|| CapabilityError::Unknown {
            kind,
            key: key.to_string(),
        })
}

/// Built-in task service: logs the call and returns its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogService;

impl TaskService for LogService {
    fn call(&self, method: &str, args: &[Value]) -> std::result::Result<Value, String> {
        let args = Value::Array(args.to_vec());
        info!(event = "task.log", method = %method, args = %args);
        Ok(args)
    }
}
