//! Configuration
//!
//! Layered configuration for a sync run: built-in defaults, the global config
//! file, an explicit `--config` file, then `ITEMSYNC__*` environment
//! variables. CLI flags are applied on top by the tooling layer.
//!
//! Host names live here rather than in module constants so the orchestrator
//! is always constructed with explicit targets.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage_paths;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage_paths::StorageConfig;

use crate::enrich::StatusPolicy;
use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::types::StatusCode;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the record id in enrichment paths.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Root configuration for a sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where discovery starts and how child indexes are recognised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Host serving the sitemap tree
    #[serde(default = "default_index_host")]
    pub host: String,

    /// Path of the root index document
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Substring identifying root entries that are item indexes worth walking
    #[serde(default = "default_child_marker")]
    pub child_marker: String,
}

fn default_index_host() -> String {
    "www.wowhead.com".to_string()
}

fn default_root_path() -> String {
    "/sitemap".to_string()
}

fn default_child_marker() -> String {
    "sitemap=item/".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            host: default_index_host(),
            root_path: default_root_path(),
            child_marker: default_child_marker(),
        }
    }
}

/// Per-record lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Host answering per-record lookups
    #[serde(default = "default_enrichment_host")]
    pub host: String,

    /// Request path; `{id}` is replaced by the record id
    #[serde(default = "default_path_template")]
    pub path_template: String,

    /// Query parameter carrying the credential
    #[serde(default = "default_credential_param")]
    pub credential_param: String,

    /// Credential required by the enrichment host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Status meaning "enriched"; the body is stored
    #[serde(default = "default_success_status")]
    pub success_status: StatusCode,

    /// Status meaning "will never exist"; terminal, no body stored
    #[serde(default = "default_absent_status")]
    pub absent_status: StatusCode,

    /// Maximum in-flight lookups. 1 keeps the sweep strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_enrichment_host() -> String {
    "us.api.battle.net".to_string()
}

fn default_path_template() -> String {
    "/wow/item/{id}".to_string()
}

fn default_credential_param() -> String {
    "apikey".to_string()
}

fn default_success_status() -> StatusCode {
    200
}

fn default_absent_status() -> StatusCode {
    404
}

fn default_concurrency() -> usize {
    1
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            host: default_enrichment_host(),
            path_template: default_path_template(),
            credential_param: default_credential_param(),
            api_key: None,
            success_status: default_success_status(),
            absent_status: default_absent_status(),
            concurrency: default_concurrency(),
        }
    }
}

impl EnrichmentConfig {
    pub fn status_policy(&self) -> StatusPolicy {
        StatusPolicy::new(self.success_status, self.absent_status)
    }

    /// The credential, or an error when it is missing or blank.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }
}

/// HTTP client settings shared by both hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// URL scheme used for every request
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout. Unset means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_user_agent() -> String {
    format!("itemsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl SyncConfig {
    /// Check settings that would otherwise surface mid-run.
    ///
    /// The credential is not checked here; only commands that enrich need it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.index.host.trim().is_empty() {
            errors.push("index.host cannot be empty".to_string());
        }
        if !self.index.root_path.starts_with('/') {
            errors.push(format!(
                "index.root_path must start with '/': {}",
                self.index.root_path
            ));
        }
        if self.index.child_marker.is_empty() {
            errors.push("index.child_marker cannot be empty".to_string());
        }
        if self.enrichment.host.trim().is_empty() {
            errors.push("enrichment.host cannot be empty".to_string());
        }
        if !self.enrichment.path_template.starts_with('/')
            || !self.enrichment.path_template.contains(ID_PLACEHOLDER)
        {
            errors.push(format!(
                "enrichment.path_template must start with '/' and contain {}: {}",
                ID_PLACEHOLDER, self.enrichment.path_template
            ));
        }
        if self.enrichment.credential_param.trim().is_empty() {
            errors.push("enrichment.credential_param cannot be empty".to_string());
        }
        if self.enrichment.success_status == self.enrichment.absent_status {
            errors.push(format!(
                "enrichment.success_status and enrichment.absent_status must differ (both {})",
                self.enrichment.success_status
            ));
        }
        if self.enrichment.concurrency == 0 {
            errors.push("enrichment.concurrency must be at least 1".to_string());
        }
        if self.transport.scheme != "https" && self.transport.scheme != "http" {
            errors.push(format!(
                "transport.scheme must be 'https' or 'http': {}",
                self.transport.scheme
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}
