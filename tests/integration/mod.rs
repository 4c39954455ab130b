//! Integration tests for catalog discovery and enrichment

mod discovery;
mod enrichment;
mod resume;
