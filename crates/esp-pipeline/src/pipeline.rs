//! The ingestion state machine.
//!
//! One call to [`EventPipeline::process`] drives a request from `Received` to
//! `Persisted`, or stops in `Errored` with nothing written to the sink.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use esp_core::{
    is_empty, obs, CapabilityRegistry, EnrichedEvent, EventContext, EventSchema, EventUri,
    OrderedMap, RawEvent, RuleGroupConfig,
};
use esp_store::{Acknowledgement, Clock, IndexSink, PackageRegistry, SchemaRegistry, SystemClock};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::request::{IngestRequest, IngestResponse};
use crate::runner::{GroupFailure, GroupRunner, TaskOutputs};
use crate::settings::PipelineSettings;
use crate::stage::PipelineStage;

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub acknowledgement: Acknowledgement,
    /// The document as it was handed to the sink.
    pub document: EnrichedEvent,
    /// Never persisted; returned for the caller's inspection only.
    pub task_outputs: TaskOutputs,
    pub group_failures: Vec<GroupFailure>,
}

impl PipelineOutcome {
    /// Whether every rule group and task completed.
    pub fn is_clean(&self) -> bool {
        self.group_failures.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.group_failures.len()
    }
}

/// A request that passed input validation.
#[derive(Debug)]
struct ValidatedEvent {
    uri: EventUri,
    properties: Map<String, Value>,
    relationships: Map<String, Value>,
    timestamp: Option<DateTime<Utc>>,
}

/// Composes validation, schema filtering, enrichment, rules, tasks and
/// persistence over injected collaborators.
pub struct EventPipeline {
    schemas: Arc<dyn SchemaRegistry>,
    packages: Arc<dyn PackageRegistry>,
    sink: Arc<dyn IndexSink>,
    clock: Arc<dyn Clock>,
    capabilities: CapabilityRegistry,
    settings: PipelineSettings,
}

impl EventPipeline {
    pub fn new(
        schemas: Arc<dyn SchemaRegistry>,
        packages: Arc<dyn PackageRegistry>,
        sink: Arc<dyn IndexSink>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        Self {
            schemas,
            packages,
            sink,
            clock: Arc::new(SystemClock),
            capabilities,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one request through the pipeline.
    pub async fn process(&self, request: IngestRequest) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let label = request.body.event.clone().unwrap_or_default();
        let span = obs::run_span(&run_id, &label);

        async move {
            obs::emit_request_received(&run_id, &label);
            let mut stage = PipelineStage::Received;
            let result = self.drive(&run_id, request, &mut stage).await;
            if let Err(err) = &result {
                obs::emit_pipeline_errored(stage.name(), err.code(), err);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run one request and render the caller-facing response.
    pub async fn respond(&self, request: IngestRequest) -> IngestResponse {
        match self.process(request).await {
            Ok(outcome) => IngestResponse::Acknowledged(outcome.acknowledgement),
            Err(err) => err.to_response(),
        }
    }

    async fn drive(
        &self,
        run_id: &str,
        request: IngestRequest,
        stage: &mut PipelineStage,
    ) -> Result<PipelineOutcome, PipelineError> {
        let IngestRequest { body, ip, locale } = request;

        // Received -> Validated
        let validated = validate(body)?;
        let uri = &validated.uri;
        advance(stage, PipelineStage::Validated);

        // Validated -> SchemaFiltered
        let schema = self
            .schemas
            .lookup(uri.package(), uri.event_name())
            .await
            .map_err(PipelineError::Registry)?
            .ok_or_else(|| PipelineError::SchemaNotFound {
                package: uri.package().map(str::to_string),
                event: uri.event_name().to_string(),
            })?;
        let properties = schema.filter(uri.event_name(), &validated.properties)?;
        advance(stage, PipelineStage::SchemaFiltered);

        // SchemaFiltered -> Enriched
        let mut event = EnrichedEvent::new(properties, self.clock.now());
        if let Some(timestamp) = validated.timestamp {
            event.timestamp = timestamp;
        }
        event.context = EventContext { ip, locale };
        event.relationships = validated.relationships;
        advance(stage, PipelineStage::Enriched);

        // Enriched -> RulesEvaluated
        let package = match uri.package() {
            Some(package) => self
                .packages
                .lookup(package)
                .await
                .map_err(PipelineError::Registry)?,
            None => None,
        };
        if package.is_none() {
            debug!(uri = %uri, "no package configuration, no rules to run");
        }
        let no_groups = OrderedMap::new();
        let groups: &OrderedMap<RuleGroupConfig> = package
            .as_ref()
            .and_then(|p| p.rule_groups(uri.event_name()))
            .unwrap_or(&no_groups);
        let manager = package.as_ref().and_then(|p| p.manager.as_deref());

        let runner = GroupRunner::new(&self.capabilities);
        runner.preflight(groups, manager)?;
        let mut group_failures = runner.evaluate_rules(groups, &mut event);
        if let Some(manager) = manager {
            self.detach(manager, &schema, uri, &mut event)?;
        }
        advance(stage, PipelineStage::RulesEvaluated);

        // RulesEvaluated -> TasksExecuted
        let (task_outputs, task_failures) = runner.execute_tasks(groups, &event);
        group_failures.extend(task_failures);
        advance(stage, PipelineStage::TasksExecuted);

        // TasksExecuted -> Persisted
        let index = self.settings.index_name(uri.package());
        let document = serde_json::to_value(&event)?;
        let acknowledgement = self
            .sink
            .index(&index, uri.event_name(), &document)
            .await
            .map_err(PipelineError::Sink)?;
        obs::emit_persisted(
            &acknowledgement.index,
            &acknowledgement.type_name,
            &acknowledgement.id,
        );
        advance(stage, PipelineStage::Persisted);

        Ok(PipelineOutcome {
            run_id: run_id.to_string(),
            acknowledgement,
            document: event,
            task_outputs,
            group_failures,
        })
    }

    /// Hand the properties to the package's ESP manager and re-filter its output.
    fn detach(
        &self,
        manager_key: &str,
        schema: &EventSchema,
        uri: &EventUri,
        event: &mut EnrichedEvent,
    ) -> Result<(), PipelineError> {
        let manager = self.capabilities.resolve_manager(manager_key)?;
        let detached = manager
            .detach_event(uri.event_name(), event.properties.clone())
            .map_err(|message| PipelineError::Manager {
                manager: manager_key.to_string(),
                message,
            })?;
        event.properties = schema.filter(uri.event_name(), &detached)?;
        Ok(())
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug_assert_eq!(stage.next(), Some(next));
    *stage = next;
    obs::emit_stage_reached(next.name());
}

/// Check the required fields and parse the event URI.
fn validate(body: RawEvent) -> Result<ValidatedEvent, PipelineError> {
    let event = match body.event {
        Some(event) if !event.trim().is_empty() => event,
        _ => return Err(PipelineError::EventNotDefined),
    };

    let properties = match body.properties {
        None | Some(Value::Null) => return Err(PipelineError::PropertiesNotDefined),
        Some(value) if is_empty(&value) => return Err(PipelineError::PropertiesEmpty),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(PipelineError::MalformedRequest(
                "properties must be an object".to_string(),
            ))
        }
    };

    let relationships = match body.relationships {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(PipelineError::MalformedRequest(
                "relationships must be an object".to_string(),
            ))
        }
    };

    Ok(ValidatedEvent {
        uri: EventUri::parse(&event)?,
        properties,
        relationships,
        timestamp: body.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_requires_event_and_properties() {
        let missing_event = RawEvent {
            properties: Some(json!({"a": 1})),
            ..RawEvent::default()
        };
        assert!(matches!(
            validate(missing_event),
            Err(PipelineError::EventNotDefined)
        ));

        let blank_event = RawEvent::new("  ", json!({"a": 1}));
        assert!(matches!(
            validate(blank_event),
            Err(PipelineError::EventNotDefined)
        ));

        let missing_properties = RawEvent {
            event: Some("Ping".to_string()),
            ..RawEvent::default()
        };
        assert!(matches!(
            validate(missing_properties),
            Err(PipelineError::PropertiesNotDefined)
        ));

        assert!(matches!(
            validate(RawEvent::new("Ping", json!({}))),
            Err(PipelineError::PropertiesEmpty)
        ));
        assert!(matches!(
            validate(RawEvent::new("Ping", json!("text"))),
            Err(PipelineError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_validate_parses_uri_and_defaults_relationships() {
        let validated = validate(RawEvent::new("acme/shop/Purchase", json!({"amount": 1}))).unwrap();
        assert_eq!(validated.uri.package(), Some("acme/shop"));
        assert_eq!(validated.uri.event_name(), "Purchase");
        assert!(validated.relationships.is_empty());
        assert!(validated.timestamp.is_none());

        let err = validate(RawEvent::new("acme/BadEvent", json!({"amount": 1}))).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidUri(_)));
    }

    #[test]
    fn test_validate_rejects_scalar_relationships() {
        let body = RawEvent::new("Ping", json!({"a": 1})).with_relationships(json!([1]));
        assert!(matches!(
            validate(body),
            Err(PipelineError::MalformedRequest(_))
        ));
    }
}
