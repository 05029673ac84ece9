//! Pipeline states.

use serde::{Deserialize, Serialize};

/// States of one ingestion run, in the order they are reached.
///
/// `Errored` is absorbing and reachable from every other state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Validated,
    SchemaFiltered,
    Enriched,
    RulesEvaluated,
    TasksExecuted,
    Persisted,
    Errored,
}

impl PipelineStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::SchemaFiltered => "schema_filtered",
            PipelineStage::Enriched => "enriched",
            PipelineStage::RulesEvaluated => "rules_evaluated",
            PipelineStage::TasksExecuted => "tasks_executed",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Errored => "errored",
        }
    }

    /// The state a successful step leads to.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Received => Some(PipelineStage::Validated),
            PipelineStage::Validated => Some(PipelineStage::SchemaFiltered),
            PipelineStage::SchemaFiltered => Some(PipelineStage::Enriched),
            PipelineStage::Enriched => Some(PipelineStage::RulesEvaluated),
            PipelineStage::RulesEvaluated => Some(PipelineStage::TasksExecuted),
            PipelineStage::TasksExecuted => Some(PipelineStage::Persisted),
            PipelineStage::Persisted | PipelineStage::Errored => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Persisted | PipelineStage::Errored)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
