//! Itemsync: Resumable Catalog Discovery and Enrichment
//!
//! Walks a sitemap-style index tree to discover record ids, keeps them in a
//! durable catalog, and enriches each pending record with one lookup against
//! a remote host. Every step commits before the next begins, so a run can be
//! stopped at any point and resumed by running again.

pub mod config;
pub mod enrich;
pub mod error;
pub mod index;
pub mod logging;
pub mod store;
pub mod sync;
pub mod tooling;
pub mod transport;
pub mod types;

pub use config::SyncConfig;
pub use enrich::{EnrichmentFetcher, Outcome, StatusPolicy};
pub use error::{ConfigError, DiscoveryError, StorageError, SyncError, TransportError};
pub use index::{extract_record_id, parse_locations, split_entries, IndexWalker};
pub use store::{CatalogStats, CatalogStore, Record, SledCatalogStore};
pub use sync::{DiscoveryReport, EnrichmentReport, SyncOrchestrator, SyncReport};
pub use transport::{HttpTransport, Response, Transport};
pub use types::{RecordId, StatusCode};
