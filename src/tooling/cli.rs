//! CLI Tooling
//!
//! Command-line surface for catalog synchronization. Flags are layered over
//! the loaded configuration, then a [`CliContext`] opens the catalog and
//! executes one command, returning the text to print.

use crate::config::{ConfigLoader, SyncConfig};
use crate::error::{ConfigError, SyncError};
use crate::store::{CatalogStats, CatalogStore, SledCatalogStore};
use crate::sync::{DiscoveryReport, EnrichmentReport, SyncOrchestrator, SyncReport};
use crate::transport::HttpTransport;
use crate::types::RecordId;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Itemsync CLI - resumable catalog discovery and enrichment
#[derive(Parser, Debug)]
#[command(name = "itemsync", version)]
#[command(about = "Discover record ids from a sitemap tree and enrich them one lookup at a time")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Catalog database path
    #[arg(long, visible_alias = "sqlite", value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Credential for the enrichment host
    #[arg(long, visible_alias = "apikey", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Configuration file path (layered over the global config)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum in-flight enrichment requests
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Discover new ids, then enrich every pending record (default)
    Sync {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Walk the index and add new ids to the catalog
    Discover {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Fetch every pending record once
    Enrich {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Summarize catalog state
    Stats {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a single record
    Show {
        /// Record id
        id: RecordId,

        /// Print the stored payload
        #[arg(long)]
        payload: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Sync {
            format: "text".to_string(),
        }
    }
}

impl Cli {
    /// Load configuration and apply flag overrides.
    pub fn resolve_config(&self) -> Result<SyncConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Flags win over every configuration source.
    pub fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(catalog) = &self.catalog {
            config.storage.catalog_path = catalog.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.enrichment.api_key = Some(api_key.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.enrichment.concurrency = concurrency;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_format(format: &str) -> Result<OutputFormat, ConfigError> {
    match format {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(ConfigError::Invalid(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            format
        ))),
    }
}

/// CLI context holding the open catalog
pub struct CliContext {
    config: SyncConfig,
    catalog_path: PathBuf,
    store: Arc<SledCatalogStore>,
}

impl CliContext {
    /// Open the catalog named by `config`.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let cwd = std::env::current_dir()?;
        let catalog_path = config.storage.resolve_catalog_path(&cwd);
        let store = SledCatalogStore::open(&catalog_path, config.enrichment.status_policy())?;
        info!(catalog = %catalog_path.display(), "Catalog opened");

        Ok(Self {
            config,
            catalog_path,
            store: Arc::new(store),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn catalog_path(&self) -> &PathBuf {
        &self.catalog_path
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, SyncError> {
        match command {
            Commands::Sync { format } => {
                let format = parse_format(format)?;
                self.config.enrichment.require_api_key()?;
                let report = runtime()?.block_on(self.orchestrator()?.run())?;
                render_sync(&report, format)
            }
            Commands::Discover { format } => {
                let format = parse_format(format)?;
                let report = runtime()?.block_on(self.orchestrator()?.discover())?;
                render_discovery(&report, format)
            }
            Commands::Enrich { format } => {
                let format = parse_format(format)?;
                self.config.enrichment.require_api_key()?;
                let report = runtime()?.block_on(self.orchestrator()?.enrich())?;
                render_enrichment(&report, format)
            }
            Commands::Stats { format } => {
                let format = parse_format(format)?;
                let stats = self.store.stats()?;
                render_stats(&stats, format)
            }
            Commands::Show { id, payload } => self.show(*id, *payload),
        }
    }

    fn orchestrator(&self) -> Result<SyncOrchestrator, SyncError> {
        let transport = Arc::new(HttpTransport::new(&self.config.transport)?);
        let store: Arc<dyn CatalogStore> = self.store.clone();
        Ok(SyncOrchestrator::from_config(&self.config, transport, store)?)
    }

    fn show(&self, id: RecordId, with_payload: bool) -> Result<String, SyncError> {
        let Some(record) = self.store.get(id)? else {
            return Ok(format!("Record {} is not in the catalog", id));
        };

        let status = record
            .status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "pending".to_string());
        let updated = record
            .updated_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        let mut out = format!(
            "Record {}\n  status:  {}\n  updated: {}\n  payload: {}",
            record.id,
            status,
            updated,
            record
                .payload
                .as_ref()
                .map(|p| format!("{} bytes", p.len()))
                .unwrap_or_else(|| "none".to_string())
        );
        if with_payload {
            if let Some(payload) = &record.payload {
                out.push_str("\n\n");
                out.push_str(&String::from_utf8_lossy(payload));
            }
        }
        Ok(out)
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, SyncError> {
    Ok(tokio::runtime::Runtime::new()?)
}

fn render_sync(report: &SyncReport, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(format!(
            "{}\n{}",
            render_discovery(&report.discovery, format)?,
            render_enrichment(&report.enrichment, format)?
        )),
    }
}

fn render_discovery(report: &DiscoveryReport, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let mut out = format!(
                "Discovery: {} index document(s), {} location(s), {} id(s), {} new",
                report.indexes_walked,
                report.locations_seen,
                report.ids_extracted,
                report.ids_inserted
            );
            if report.child_indexes_skipped > 0 {
                out.push_str(&format!(
                    " ({} child index(es) skipped)",
                    report.child_indexes_skipped
                ));
            }
            Ok(out)
        }
    }
}

fn render_enrichment(report: &EnrichmentReport, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(format!(
            "Enrichment: {} attempted, {} succeeded, {} absent, {} retryable, {} failed requests",
            report.attempted,
            report.succeeded,
            report.absent,
            report.retryable,
            report.transport_failures
        )),
    }
}

/// Stats plus the derived pending count.
#[derive(Serialize)]
struct StatsView<'a> {
    #[serde(flatten)]
    stats: &'a CatalogStats,
    pending: usize,
}

fn render_stats(stats: &CatalogStats, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Json => {
            let view = StatsView {
                stats,
                pending: stats.pending(),
            };
            Ok(serde_json::to_string_pretty(&view)?)
        }
        OutputFormat::Text => {
            let mut table = Table::new();
            table.set_header(vec!["State", "Records"]);
            for (label, count) in [
                ("Succeeded", stats.succeeded),
                ("Absent", stats.absent),
                ("Retryable", stats.retryable),
                ("Never attempted", stats.unattempted),
                ("Total", stats.total),
            ] {
                table.add_row(vec![label.to_string(), count.to_string()]);
            }
            Ok(table.to_string())
        }
    }
}
