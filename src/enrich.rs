//! Enrichment Fetcher
//!
//! One lookup per record against the enrichment host, plus the policy that
//! decides which status codes end a record's life. Exactly one code means
//! success (body kept), exactly one means definitive absence; everything else
//! is retried on the next sweep. The fetcher itself never retries.

use crate::config::{EnrichmentConfig, ID_PLACEHOLDER};
use crate::error::{ConfigError, TransportError};
use crate::transport::{Response, Transport};
use crate::types::{RecordId, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Classification of an enrichment status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal; the body becomes the record payload.
    Success,
    /// Terminal; the record will never succeed.
    Absent,
    /// Non-terminal; the record stays pending.
    Retry,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Retry)
    }
}

/// Success and definitive-absence codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    success: StatusCode,
    absent: StatusCode,
}

impl StatusPolicy {
    pub fn new(success: StatusCode, absent: StatusCode) -> Self {
        Self { success, absent }
    }

    pub fn success(&self) -> StatusCode {
        self.success
    }

    pub fn absent(&self) -> StatusCode {
        self.absent
    }

    pub fn classify(&self, status: StatusCode) -> Outcome {
        if status == self.success {
            Outcome::Success
        } else if status == self.absent {
            Outcome::Absent
        } else {
            Outcome::Retry
        }
    }

    /// True when a stored status means the record is finished.
    pub fn is_terminal(&self, status: Option<StatusCode>) -> bool {
        status.is_some_and(|code| self.classify(code).is_terminal())
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::new(200, 404)
    }
}

/// Per-record lookup client.
pub struct EnrichmentFetcher {
    transport: Arc<dyn Transport>,
    host: String,
    path_template: String,
    credential_param: String,
    api_key: String,
}

impl EnrichmentFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        host: impl Into<String>,
        path_template: impl Into<String>,
        credential_param: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            host: host.into(),
            path_template: path_template.into(),
            credential_param: credential_param.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a fetcher from config. Fails when no credential is configured.
    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &EnrichmentConfig,
    ) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(
            transport,
            config.host.clone(),
            config.path_template.clone(),
            config.credential_param.clone(),
            api_key,
        ))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request path for `id`, credential included. Do not log this.
    pub fn request_path(&self, id: RecordId) -> String {
        let path = self.path_template.replace(ID_PLACEHOLDER, &id.to_string());
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.credential_param, &self.api_key)
            .finish();
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", path, separator, query)
    }

    /// Issue exactly one lookup for `id` and return whatever the host said.
    pub async fn fetch(&self, id: RecordId) -> Result<Response, TransportError> {
        let path = self.request_path(id);
        let response = self.transport.request(&self.host, &path).await?;
        debug!(
            record_id = id,
            status = response.status,
            bytes = response.body.len(),
            "Enrichment response"
        );
        Ok(response)
    }
}
