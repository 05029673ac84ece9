//! Log output for the `esp` binary.
//!
//! Pipeline milestones from [`crate::obs`] are emitted inside the `esp.run`
//! span, so JSON lines carry the run id and event URI of the request that
//! produced them. Everything goes to stderr; stdout is reserved for the
//! ingestion response.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level when `RUST_LOG` is unset.
const ESP_TARGETS: [&str; 4] = ["esp_core", "esp_store", "esp_pipeline", "esp"];

/// Filter used without `RUST_LOG`: ESP crates at `level`, dependencies at `warn`.
fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    ESP_TARGETS
        .iter()
        .fold("warn".to_string(), |acc, target| format!("{acc},{target}={level}"))
}

/// Install the global subscriber. A second call leaves the first one in place.
///
/// With `json`, each line is a flat object whose fields include those of the
/// enclosing `esp.run` span.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
