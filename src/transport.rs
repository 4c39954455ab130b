//! Transport
//!
//! The HTTP collaborator used for both index documents and enrichment lookups.
//! The engine only sees the [`Transport`] trait; [`HttpTransport`] is the
//! production implementation over `reqwest`.

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::types::StatusCode;
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Raw response from a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, reason: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One request against a host, answered with status, reason and body.
///
/// Async because every call is network I/O. Implementations must not retry;
/// retry is the sweep's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, host: &str, path: &str) -> Result<Response, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    scheme: String,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| TransportError::Request {
            url: String::new(),
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
        })
    }

    fn url_for(&self, host: &str, path: &str) -> Result<String, TransportError> {
        if host.is_empty() || host.contains('/') {
            return Err(TransportError::InvalidTarget(host.to_string()));
        }
        if !path.starts_with('/') {
            return Err(TransportError::InvalidTarget(path.to_string()));
        }
        Ok(format!("{}://{}{}", self.scheme, host, path))
    }
}

/// Errors may end up in logs; the query string can carry a credential.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?...", base),
        None => url.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, host: &str, path: &str) -> Result<Response, TransportError> {
        let url = self.url_for(host, path)?;
        let shown = redact_query(&url);
        trace!(host = %host, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: shown.clone(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            url: shown,
            message: e.without_url().to_string(),
        })?;

        Ok(Response {
            status: status.as_u16(),
            reason,
            body: body.to_vec(),
        })
    }
}
