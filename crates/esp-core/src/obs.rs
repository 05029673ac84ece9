//! Structured observability hooks for the ingestion pipeline.
//!
//! This module provides:
//! - The request-scoped `esp.run` span
//! - Emission functions for pipeline milestones: receipt, stage transitions,
//!   rule scoring, task completion, isolated group failures, persistence
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use tracing::{error, info, warn};

/// The request-scoped `esp.run` span, tagged with the run id and event URI.
///
/// Attach it to async work with `tracing::Instrument`; synchronous callers
/// can hold `run_span(..).entered()`.
pub fn run_span(run_id: &str, event: &str) -> tracing::Span {
    tracing::info_span!("esp.run", run_id = %run_id, event = %event)
}

/// Emit event: a request body was received.
pub fn emit_request_received(run_id: &str, event: &str) {
    info!(event = "request.received", run_id = %run_id, uri = %event);
}

/// Emit event: the pipeline entered `stage`.
///
/// ```ignore
/// emit_stage_reached("schema_filtered");
/// // logs: event=pipeline.stage stage=schema_filtered
/// ```
pub fn emit_stage_reached(stage: &str) {
    info!(event = "pipeline.stage", stage = %stage);
}

/// Emit event: a rule group produced its result.
pub fn emit_rule_group_scored(group: &str, rule: &str, result: &serde_json::Value) {
    info!(event = "rule.scored", group = %group, rule = %rule, result = %result);
}

/// Emit event: a task finished.
pub fn emit_task_completed(group: &str, task: &str) {
    info!(event = "task.completed", group = %group, task = %task);
}

/// Emit event: a rule group failed and was isolated.
///
/// `chain` is the rendered error source chain.
pub fn emit_group_failed(
    group: &str,
    task: Option<&str>,
    expression: Option<&str>,
    error: &dyn std::error::Error,
) {
    error!(
        event = "group.failed",
        group = %group,
        task = task.unwrap_or("-"),
        expression = expression.unwrap_or("-"),
        error = %error,
        chain = %error_chain(error),
    );
}

/// Emit event: the document was accepted by the sink.
pub fn emit_persisted(index: &str, type_name: &str, id: &str) {
    info!(event = "pipeline.persisted", index = %index, type_name = %type_name, id = %id);
}

/// Emit event: the run ended in the errored state (warning level).
pub fn emit_pipeline_errored(stage: &str, code: u16, error: &dyn std::fmt::Display) {
    warn!(event = "pipeline.errored", stage = %stage, code = code, error = %error);
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
