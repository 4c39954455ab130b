//! Sync Orchestrator
//!
//! Two phases, in order, never revisited within a run:
//!
//! 1. Discovery: walk the index tree and `ensure` every extracted id. Any
//!    failure aborts the run before a single enrichment request is made.
//! 2. Enrichment: snapshot the pending records once, then fetch, classify and
//!    commit each one in ascending id order.
//!
//! Interrupting a run is safe at any point. Rerunning rediscovers (a no-op
//! for known ids) and resumes with whatever is still pending.

use crate::config::SyncConfig;
use crate::enrich::{EnrichmentFetcher, Outcome};
use crate::error::{ConfigError, SyncError};
use crate::index::IndexWalker;
use crate::store::CatalogStore;
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Counters from the discovery phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub indexes_walked: usize,
    pub locations_seen: usize,
    /// Child indexes left unwalked; their ids were not discovered
    pub child_indexes_skipped: usize,
    pub ids_extracted: usize,
    /// Ids that were new to the catalog
    pub ids_inserted: usize,
}

/// Counters from the enrichment phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub absent: usize,
    /// Answered with a non-terminal status
    pub retryable: usize,
    /// No answer at all; the record was left untouched
    pub transport_failures: usize,
}

impl EnrichmentReport {
    /// Records still pending after this sweep.
    pub fn still_pending(&self) -> usize {
        self.retryable + self.transport_failures
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub discovery: DiscoveryReport,
    pub enrichment: EnrichmentReport,
}

pub struct SyncOrchestrator {
    walker: IndexWalker,
    fetcher: Option<EnrichmentFetcher>,
    store: Arc<dyn CatalogStore>,
    root_path: String,
    child_marker: String,
    concurrency: usize,
}

impl SyncOrchestrator {
    /// Build an orchestrator from validated config.
    ///
    /// Without a credential the orchestrator can still discover; enrichment
    /// then fails with a configuration error. The store's status policy must
    /// match the configured one, since the store decides what is terminal.
    pub fn from_config(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CatalogStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let configured = config.enrichment.status_policy();
        let stored = store.policy();
        if stored != configured {
            return Err(ConfigError::Invalid(format!(
                "Catalog classifies with success={} absent={}, but enrichment is configured with success={} absent={}",
                stored.success(),
                stored.absent(),
                configured.success(),
                configured.absent()
            )));
        }

        let walker = IndexWalker::new(Arc::clone(&transport), config.index.host.clone());
        let fetcher = EnrichmentFetcher::from_config(transport, &config.enrichment).ok();

        Ok(Self {
            walker,
            fetcher,
            store,
            root_path: config.index.root_path.clone(),
            child_marker: config.index.child_marker.clone(),
            concurrency: config.enrichment.concurrency,
        })
    }

    pub fn can_enrich(&self) -> bool {
        self.fetcher.is_some()
    }

    fn fetcher(&self) -> Result<&EnrichmentFetcher, ConfigError> {
        self.fetcher.as_ref().ok_or(ConfigError::MissingApiKey)
    }

    /// Discovery followed by enrichment.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        // Fail on a missing credential before spending requests on discovery.
        self.fetcher()?;

        let discovery = self.discover().await?;
        let enrichment = self.enrich().await?;
        Ok(SyncReport {
            discovery,
            enrichment,
        })
    }

    /// Walk the index and add every new id to the catalog.
    pub async fn discover(&self) -> Result<DiscoveryReport, SyncError> {
        info!(
            host = %self.walker.host(),
            root = %self.root_path,
            "Discovery phase started"
        );

        let marker = self.child_marker.as_str();
        let discovery = self
            .walker
            .discover(&self.root_path, |location| location.contains(marker))
            .await?;

        let mut report = DiscoveryReport {
            indexes_walked: discovery.indexes_walked,
            locations_seen: discovery.locations_seen,
            child_indexes_skipped: discovery.child_indexes_skipped,
            ids_extracted: discovery.ids_extracted(),
            ids_inserted: 0,
        };

        for batch in &discovery.batches {
            if batch.ids.is_empty() {
                continue;
            }
            let inserted = self.store.ensure_many(&batch.ids)?;
            report.ids_inserted += inserted;
            info!(
                path = %batch.path,
                ids = batch.ids.len(),
                inserted,
                "Catalog updated from index"
            );
        }

        if report.child_indexes_skipped > 0 {
            warn!(
                skipped = report.child_indexes_skipped,
                "Some child indexes were not walked"
            );
        }
        info!(
            indexes = report.indexes_walked,
            extracted = report.ids_extracted,
            inserted = report.ids_inserted,
            "Discovery phase complete"
        );
        Ok(report)
    }

    /// Fetch every pending record once and commit each outcome.
    ///
    /// The pending set is read once up front. A transport failure leaves the
    /// record as it was and the sweep moves on; a storage failure stops it.
    pub async fn enrich(&self) -> Result<EnrichmentReport, SyncError> {
        let fetcher = self.fetcher()?;
        let policy = self.store.policy();
        let pending = self.store.list_pending()?;
        let total = pending.len();
        info!(
            pending = total,
            host = %fetcher.host(),
            concurrency = self.concurrency,
            "Enrichment phase started"
        );

        let mut report = EnrichmentReport::default();
        let mut responses = stream::iter(pending)
            .map(|record| async move { (record.id, fetcher.fetch(record.id).await) })
            .buffered(self.concurrency);

        while let Some((id, result)) = responses.next().await {
            report.attempted += 1;
            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    report.transport_failures += 1;
                    warn!(
                        record_id = id,
                        progress = %format!("{}/{}", report.attempted, total),
                        error = %e,
                        "Enrichment request failed, record stays pending"
                    );
                    continue;
                }
            };

            let outcome = policy.classify(response.status);
            let payload = (outcome == Outcome::Success).then_some(response.body);
            self.store.record_result(id, response.status, payload)?;

            match outcome {
                Outcome::Success => report.succeeded += 1,
                Outcome::Absent => report.absent += 1,
                Outcome::Retry => report.retryable += 1,
            }
            info!(
                record_id = id,
                status = response.status,
                reason = %response.reason,
                progress = %format!("{}/{}", report.attempted, total),
                "Fetched record"
            );
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            absent = report.absent,
            still_pending = report.still_pending(),
            "Enrichment phase complete"
        );
        Ok(report)
    }
}
