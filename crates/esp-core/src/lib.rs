//! ESP Core Library
//!
//! Domain types and the pure processing stages of the event ingestion
//! pipeline: URI and property-path validation, schema filtering, the
//! expression language, rule capabilities and task execution.

pub mod capability;
pub mod domain;
pub mod expr;
pub mod obs;
pub mod rules;
pub mod tasks;
pub mod telemetry;

pub use capability::{
    CapabilityError, CapabilityKind, CapabilityRegistry, EspManager, LogService, RuleCapability,
    TaskService, LOG_SERVICE,
};

pub use domain::{
    is_blank, is_empty, json_type_name, validate_event_uris, EnrichedEvent, EventConfig,
    EventContext, EventSchema, EventUri, FieldType, InvalidArgument, OrderedMap, PackageConfig,
    PropertyPath, RawEvent, RuleGroupConfig, RuleResults, RuleSpec, SchemaError, Segment,
    TaskConfig, BUSINESS_RULE, DATA_MAPPER,
};

pub use expr::{ExprError, ExprResult, Expression, Scope};
pub use rules::{map_properties, score, to_credit, BusinessRule, DataMapper, RuleError};
pub use tasks::{TaskError, TaskExecutor, TaskRun};

pub use obs::{
    emit_group_failed, emit_persisted, emit_pipeline_errored, emit_request_received,
    emit_rule_group_scored, emit_stage_reached, emit_task_completed, error_chain, run_span,
};
pub use telemetry::init_tracing;

/// ESP version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
