//! Index Walker
//!
//! Resolves a sitemap tree (index of indexes) down to leaf entries and pulls
//! record ids out of the leaf URLs. Discovery is all-or-nothing: the walk
//! completes in memory before anything is handed to the catalog, and any
//! fetch or parse failure aborts it.

use crate::error::DiscoveryError;
use crate::transport::Transport;
use crate::types::RecordId;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// XML namespace of `<loc>` entries in sitemaps and sitemap indexes.
pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Child index documents are followed at most this deep below the root.
pub const MAX_INDEX_DEPTH: usize = 8;

static ITEM_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"item=(\d+)").expect("item id pattern is valid"));

/// Ids extracted from one index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBatch {
    /// Request path of the document
    pub path: String,
    /// Entries consumed directly (not followed as child indexes)
    pub leaf_entries: usize,
    /// Ids in document order; entries without an id are dropped
    pub ids: Vec<RecordId>,
}

/// Result of a complete walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub indexes_walked: usize,
    pub locations_seen: usize,
    /// Child indexes not followed: foreign host, unparseable, or too deep
    pub child_indexes_skipped: usize,
    pub batches: Vec<IndexBatch>,
}

impl Discovery {
    pub fn ids_extracted(&self) -> usize {
        self.batches.iter().map(|batch| batch.ids.len()).sum()
    }
}

/// Extract the record id from a leaf URL.
///
/// Returns the first `item=<digits>` match, or `None` when the URL has no
/// such marker or the digits do not fit a [`RecordId`].
pub fn extract_record_id(url: &str) -> Option<RecordId> {
    ITEM_ID_PATTERN
        .captures(url)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Split entries into (followed, consumed directly) by `is_child_index`.
pub fn split_entries<P>(entries: Vec<String>, is_child_index: P) -> (Vec<String>, Vec<String>)
where
    P: Fn(&str) -> bool,
{
    entries
        .into_iter()
        .partition(|entry| is_child_index(entry.as_str()))
}

/// Parse every sitemap-namespace `<loc>` text in `document`, at any depth.
///
/// `source` only labels errors. A document with no root element, with
/// unclosed elements, or with invalid XML is malformed.
pub fn parse_locations(source: &str, document: &[u8]) -> Result<Vec<String>, DiscoveryError> {
    let malformed = |message: String| DiscoveryError::Malformed {
        path: source.to_string(),
        message,
    };

    let mut reader = NsReader::from_reader(document);
    let mut buf = Vec::new();
    let mut locations = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<String> = None;

    loop {
        let event = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| malformed(e.to_string()))?;

        match event {
            (ns, Event::Start(ref e)) => {
                depth += 1;
                saw_root = true;
                if is_sitemap_loc(&ns, e.local_name().as_ref()) {
                    current = Some(String::new());
                }
            }
            (_, Event::Empty(_)) => {
                saw_root = true;
            }
            (ns, Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                if is_sitemap_loc(&ns, e.local_name().as_ref()) {
                    if let Some(text) = current.take() {
                        let text = text.trim();
                        if !text.is_empty() {
                            locations.push(text.to_string());
                        }
                    }
                }
            }
            (_, Event::Text(ref e)) => {
                if let Some(text) = current.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| malformed(format!("bad entity in <loc>: {}", err)))?;
                    text.push_str(&unescaped);
                }
            }
            (_, Event::CData(ref e)) => {
                if let Some(text) = current.as_mut() {
                    let raw = std::str::from_utf8(e)
                        .map_err(|err| malformed(format!("non-UTF-8 <loc>: {}", err)))?;
                    text.push_str(raw);
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(malformed("document has no root element".to_string()));
    }
    if depth != 0 {
        return Err(malformed(format!(
            "document ended with {} unclosed element(s)",
            depth
        )));
    }

    Ok(locations)
}

fn is_sitemap_loc(ns: &ResolveResult, local_name: &[u8]) -> bool {
    local_name == b"loc" && matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SITEMAP_NAMESPACE)
}

/// Walks sitemap documents on a single host.
pub struct IndexWalker {
    transport: Arc<dyn Transport>,
    host: String,
}

impl IndexWalker {
    pub fn new(transport: Arc<dyn Transport>, host: impl Into<String>) -> Self {
        Self {
            transport,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetch the document at `path` and return its `<loc>` entries.
    pub async fn fetch_locations(&self, path: &str) -> Result<Vec<String>, DiscoveryError> {
        info!(host = %self.host, path = %path, "Fetching index");
        let response = self.transport.request(&self.host, path).await?;
        info!(
            path = %path,
            status = response.status,
            reason = %response.reason,
            "Index fetched"
        );

        if !response.is_success() {
            return Err(DiscoveryError::Status {
                path: path.to_string(),
                status: response.status,
                reason: response.reason,
            });
        }

        let locations = parse_locations(path, &response.body)?;
        debug!(path = %path, count = locations.len(), "Index parsed");
        Ok(locations)
    }

    /// Turn a `<loc>` URL into a request path on this walker's host.
    ///
    /// Bare paths pass through. Absolute URLs on another host, and anything
    /// unparseable, yield `None`.
    pub fn location_to_path(&self, location: &str) -> Option<String> {
        if location.starts_with('/') {
            return Some(location.to_string());
        }
        let url = match url::Url::parse(location) {
            Ok(url) => url,
            Err(e) => {
                warn!(location = %location, error = %e, "Skipping unparseable index location");
                return None;
            }
        };
        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case(&self.host) => {}
            other => {
                warn!(
                    location = %location,
                    host = ?other,
                    "Skipping index location on a foreign host"
                );
                return None;
            }
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Some(path)
    }

    /// Walk from `root`, following entries accepted by `is_child_index` and
    /// extracting ids from everything else.
    ///
    /// Documents are fetched one at a time in breadth-first order. Each path
    /// is fetched at most once.
    pub async fn discover<P>(&self, root: &str, is_child_index: P) -> Result<Discovery, DiscoveryError>
    where
        P: Fn(&str) -> bool,
    {
        let mut discovery = Discovery::default();
        let mut queue = VecDeque::from([(root.to_string(), 0usize)]);
        let mut visited = HashSet::from([root.to_string()]);

        while let Some((path, depth)) = queue.pop_front() {
            let locations = self.fetch_locations(&path).await?;
            discovery.indexes_walked += 1;
            discovery.locations_seen += locations.len();

            let (children, leaves) = split_entries(locations, &is_child_index);

            if depth >= MAX_INDEX_DEPTH && !children.is_empty() {
                discovery.child_indexes_skipped += children.len();
                warn!(
                    path = %path,
                    skipped = children.len(),
                    "Index depth limit reached, not following child indexes"
                );
            } else {
                for child in children {
                    let Some(child_path) = self.location_to_path(&child) else {
                        discovery.child_indexes_skipped += 1;
                        continue;
                    };
                    if visited.insert(child_path.clone()) {
                        queue.push_back((child_path, depth + 1));
                    }
                }
            }

            let ids: Vec<RecordId> = leaves
                .iter()
                .filter_map(|entry| extract_record_id(entry))
                .collect();
            if !leaves.is_empty() {
                debug!(
                    path = %path,
                    entries = leaves.len(),
                    ids = ids.len(),
                    "Extracted record ids"
                );
            }
            discovery.batches.push(IndexBatch {
                path,
                leaf_entries: leaves.len(),
                ids,
            });
        }

        Ok(discovery)
    }
}
