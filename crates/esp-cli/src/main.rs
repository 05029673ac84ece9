//! ESP - event ingestion from the command line
//!
//! The `esp` command runs request bodies through the ingestion pipeline
//! against collaborators stored under a data directory.
//!
//! ## Commands
//!
//! - `ingest`: Validate, filter, score and index one event
//! - `check-uri`: Validate a comma-separated list of event URIs
//! - `check-path`: Validate a property path and show its segments
//!
//! ## Data directory
//!
//! - `schemas/<vendor>/<package>/<EventName>.json` (bare events: `schemas/<EventName>.json`)
//! - `packages/<vendor>/<package>.json`
//! - `index/<index>/<type>.jsonl`, written by `ingest`

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use esp_core::{validate_event_uris, CapabilityRegistry, PropertyPath};
use esp_pipeline::{EventPipeline, IngestRequest, IngestResponse, PipelineSettings};
use esp_store::{FsIndexSink, FsPackageRegistry, FsSchemaRegistry};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "esp")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Event Stream Processing (ESP) ingestion pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Root of the schema, package and index directories
    #[arg(long, global = true, env = "ESP_DATA_DIR", default_value = ".esp")]
    data_dir: PathBuf,

    /// First component of every index name
    #[arg(long, global = true, env = "ESP_INDEX_PREFIX", default_value = esp_pipeline::DEFAULT_INDEX_PREFIX)]
    index_prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request body through the pipeline and print the response
    Ingest {
        /// Request body file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Client IP recorded in the event context
        #[arg(long)]
        ip: Option<String>,

        /// Client locale recorded in the event context
        #[arg(long)]
        locale: Option<String>,
    },

    /// Validate event URIs (comma-separated)
    CheckUri {
        value: String,
    },

    /// Validate a property path such as ['data'][0]['id']
    CheckPath {
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    esp_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Ingest { input, ip, locale } => {
            let body = read_input(&input).await?;
            let settings = PipelineSettings::new(cli.index_prefix);
            let response =
                cmd_ingest(&cli.data_dir, settings, &body, ip.as_deref(), locale.as_deref())
                    .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                bail!("ingestion failed with code {}", response.status());
            }
            Ok(())
        }
        Commands::CheckUri { value } => {
            for line in cmd_check_uri(&value)? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::CheckPath { value } => {
            for line in cmd_check_path(&value)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read request body from stdin")?;
        return Ok(body);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read request body from {input}"))
}

/// Build the pipeline over `data_dir` and run `body` through it.
async fn cmd_ingest(
    data_dir: &Path,
    settings: PipelineSettings,
    body: &str,
    ip: Option<&str>,
    locale: Option<&str>,
) -> IngestResponse {
    let mut request = match IngestRequest::from_json(body) {
        Ok(request) => request,
        Err(err) => return err.to_response(),
    };
    if let Some(ip) = ip {
        request = request.with_ip(ip);
    }
    if let Some(locale) = locale {
        request = request.with_locale(locale);
    }

    info!(data_dir = %data_dir.display(), "Running ingestion pipeline");

    let pipeline = EventPipeline::new(
        Arc::new(FsSchemaRegistry::new(data_dir.join("schemas"))),
        Arc::new(FsPackageRegistry::new(data_dir.join("packages"))),
        Arc::new(FsIndexSink::new(data_dir.join("index"))),
        CapabilityRegistry::with_builtins(),
    )
    .with_settings(settings);

    pipeline.respond(request).await
}

fn cmd_check_uri(value: &str) -> Result<Vec<String>> {
    let uris = validate_event_uris(value)?;
    Ok(uris
        .iter()
        .map(|uri| {
            format!(
                "package={} event={}",
                uri.package().unwrap_or("-"),
                uri.event_name()
            )
        })
        .collect())
}

fn cmd_check_path(value: &str) -> Result<Vec<String>> {
    let path = PropertyPath::parse(value)?;
    Ok(path.segments().iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use esp_core::{EventSchema, FieldType};

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_and_defaults() {
        let cli = Cli::try_parse_from(["esp", "--json", "ingest", "--ip", "10.0.0.1"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.data_dir, PathBuf::from(".esp"));
        match cli.command {
            Commands::Ingest { input, ip, locale } => {
                assert_eq!(input, "-");
                assert_eq!(ip.as_deref(), Some("10.0.0.1"));
                assert!(locale.is_none());
            }
            _ => panic!("expected ingest"),
        }
    }

    #[tokio::test]
    async fn test_ingest_writes_to_the_index_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let schemas = FsSchemaRegistry::new(temp_dir.path().join("schemas"));
        schemas
            .store(
                Some("acme/shop"),
                "Purchase",
                &EventSchema::new().with_field("amount", FieldType::Number),
            )
            .await
            .unwrap();

        let response = cmd_ingest(
            temp_dir.path(),
            PipelineSettings::default(),
            r#"{"event": "acme/shop/Purchase", "properties": {"amount": 42}}"#,
            Some("127.0.0.1"),
            None,
        )
        .await;
        assert!(response.is_success(), "unexpected response: {response:?}");

        let stored = FsIndexSink::new(temp_dir.path().join("index"))
            .documents("events.esp.acme.shop", "Purchase")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source["properties"]["amount"], 42);
        assert_eq!(stored[0].source["context"]["ip"], "127.0.0.1");
    }

    #[tokio::test]
    async fn test_ingest_reports_malformed_body() {
        let temp_dir = tempfile::tempdir().unwrap();
        let response = cmd_ingest(
            temp_dir.path(),
            PipelineSettings::default(),
            "not json",
            None,
            None,
        )
        .await;
        assert_eq!(response.status(), 400);
    }

    #[test]
    fn test_check_commands() {
        assert_eq!(
            cmd_check_uri("acme/shop/Purchase, Ping").unwrap(),
            ["package=acme/shop event=Purchase", "package=- event=Ping"]
        );
        assert!(cmd_check_uri("acme/BadEvent").is_err());

        assert_eq!(
            cmd_check_path(r#"['data'][0]["id"]"#).unwrap(),
            ["['data']", "[0]", "['id']"]
        );
        assert!(cmd_check_path("['a']junk").is_err());
    }
}
