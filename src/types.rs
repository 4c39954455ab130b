//! Core types shared across the catalog engine.

/// RecordId: stable external identifier of a catalog record
pub type RecordId = u64;

/// StatusCode: enrichment outcome as reported by the remote host
pub type StatusCode = u16;

/// Storage key for a record id.
///
/// Big-endian so that the store's lexicographic key order is ascending id order.
pub fn record_key(id: RecordId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Inverse of [`record_key`]. Returns `None` for keys of the wrong width.
pub fn record_id_from_key(key: &[u8]) -> Option<RecordId> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(RecordId::from_be_bytes(bytes))
}
