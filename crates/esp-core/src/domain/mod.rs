//! ESP domain model: identifiers, schemas, events and package configuration.

pub mod error;
pub mod event;
pub mod package;
pub mod property_path;
pub mod schema;
pub mod uri;

pub use error::{InvalidArgument, SchemaError};
pub use event::{EnrichedEvent, EventContext, RawEvent, RuleResults};
pub use package::{
    EventConfig, OrderedMap, PackageConfig, RuleGroupConfig, RuleSpec, TaskConfig, BUSINESS_RULE,
    DATA_MAPPER,
};
pub use property_path::{is_blank, is_empty, PropertyPath, Segment};
pub use schema::{json_type_name, EventSchema, FieldType};
pub use uri::{validate_event_uris, EventUri};
