use std::sync::Arc;

use itemsync::error::{ConfigError, StorageError, SyncError};
use itemsync::store::{CatalogStore, SledCatalogStore};
use itemsync::sync::SyncOrchestrator;
use itemsync::StatusPolicy;

use crate::integration::support::{
    orchestrator, serve_catalog, temp_store, temp_store_with, test_config, FailingStore,
    MockTransport, API_HOST,
};

#[tokio::test]
async fn sync_enriches_discovered_records() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[10, 11]);
    transport.item(10, 200, "ok");
    transport.item(11, 404, "missing");
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap();

    assert_eq!(report.discovery.ids_inserted, 2);
    assert_eq!(report.enrichment.attempted, 2);
    assert_eq!(report.enrichment.succeeded, 1);
    assert_eq!(report.enrichment.absent, 1);
    assert_eq!(report.enrichment.still_pending(), 0);

    let found = store.get(10).unwrap().unwrap();
    assert_eq!(found.status, Some(200));
    assert_eq!(found.payload.as_deref(), Some(&b"ok"[..]));
    let gone = store.get(11).unwrap().unwrap();
    assert_eq!(gone.status, Some(404));
    assert_eq!(gone.payload, None);
}

#[tokio::test]
async fn terminal_records_are_never_fetched_again() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1, 2, 3]);
    transport.item(1, 200, "one");
    transport.item(2, 404, "");
    transport.item(3, 503, "busy");
    let store = temp_store();
    let sync = orchestrator(&test_config(), &transport, &store);

    let first = sync.run().await.unwrap();
    assert_eq!(first.enrichment.retryable, 1);
    assert_eq!(store.get(3).unwrap().unwrap().payload, None);

    transport.clear_calls();
    let second = sync.run().await.unwrap();
    assert_eq!(second.enrichment.attempted, 1);
    assert_eq!(transport.item_calls(), vec![3]);
}

#[tokio::test]
async fn lookups_run_in_ascending_id_order() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[300, 7, 42, 1000]);
    for id in [7, 42, 300, 1000] {
        transport.item(id, 200, "x");
    }
    let store = temp_store();

    orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap();

    assert_eq!(transport.item_calls(), vec![7, 42, 300, 1000]);
}

#[tokio::test]
async fn concurrent_lookups_still_commit_every_record() {
    let transport = MockTransport::new();
    let ids: Vec<u64> = (1..=20).collect();
    serve_catalog(&transport, &ids);
    for id in &ids {
        let status = if id % 5 == 0 { 404 } else { 200 };
        transport.item(*id, status, "body");
    }
    let store = temp_store();
    let mut config = test_config();
    config.enrichment.concurrency = 4;

    let report = orchestrator(&config, &transport, &store)
        .run()
        .await
        .unwrap();

    assert_eq!(report.enrichment.attempted, 20);
    assert_eq!(report.enrichment.succeeded, 16);
    assert_eq!(report.enrichment.absent, 4);
    assert_eq!(transport.item_calls(), ids);
    assert!(store.list_pending().unwrap().is_empty());
}

#[tokio::test]
async fn transport_failure_leaves_record_pending_and_sweep_continues() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1, 2, 3]);
    transport.item(1, 200, "one");
    transport.item(3, 200, "three");
    let store = temp_store();

    let sync = orchestrator(&test_config(), &transport, &store);
    sync.discover().await.unwrap();
    let report = sync.enrich().await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.transport_failures, 1);

    let untouched = store.get(2).unwrap().unwrap();
    assert_eq!(untouched.status, None);
    assert_eq!(untouched.updated_at, None);
    let pending: Vec<_> = store.list_pending().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(pending, vec![2]);
}

#[tokio::test]
async fn enrichment_requires_a_credential_before_any_request() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1]);
    let store = temp_store();
    let mut config = test_config();
    config.enrichment.api_key = None;

    let err = orchestrator(&config, &transport, &store)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Config(ConfigError::MissingApiKey)));
    assert!(transport.calls().is_empty());
    assert_eq!(store.stats().unwrap().total, 0);
}

#[tokio::test]
async fn enrichment_with_empty_catalog_makes_no_requests() {
    let transport = MockTransport::new();
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .enrich()
        .await
        .unwrap();

    assert_eq!(report.attempted, 0);
    assert!(transport.calls().iter().all(|(host, _)| host != API_HOST));
}

#[tokio::test]
async fn custom_status_policy_keeps_payload_and_finishes_records() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[10, 11, 12]);
    transport.item(10, 203, "payload");
    transport.item(11, 410, "gone");
    transport.item(12, 200, "not success here");
    let mut config = test_config();
    config.enrichment.success_status = 203;
    config.enrichment.absent_status = 410;
    let store = temp_store_with(config.enrichment.status_policy());
    let sync = orchestrator(&config, &transport, &store);

    let report = sync.run().await.unwrap();
    assert_eq!(report.enrichment.succeeded, 1);
    assert_eq!(report.enrichment.absent, 1);
    assert_eq!(report.enrichment.retryable, 1);

    let found = store.get(10).unwrap().unwrap();
    assert_eq!(found.status, Some(203));
    assert_eq!(found.payload.as_deref(), Some(&b"payload"[..]));
    assert_eq!(store.get(12).unwrap().unwrap().payload, None);

    transport.clear_calls();
    sync.run().await.unwrap();
    assert_eq!(transport.item_calls(), vec![12]);
}

#[test]
fn store_and_config_must_agree_on_status_policy() {
    let transport = MockTransport::new();
    let mut config = test_config();
    config.enrichment.success_status = 203;
    config.enrichment.absent_status = 410;
    let store: Arc<SledCatalogStore> = temp_store();

    let result = SyncOrchestrator::from_config(&config, transport, store);
    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("203")));
}

#[tokio::test]
async fn storage_failure_stops_the_sweep() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1, 2, 3]);
    for id in [1, 2, 3] {
        transport.item(id, 200, "body");
    }
    let inner = temp_store();
    let store = FailingStore::new(inner.clone(), 2);
    let sync = SyncOrchestrator::from_config(&test_config(), transport.clone(), store).unwrap();

    sync.discover().await.unwrap();
    let err = sync.enrich().await.unwrap_err();

    assert!(matches!(err, SyncError::Storage(StorageError::IoError(_))));
    assert_eq!(transport.item_calls(), vec![1, 2]);
    assert_eq!(inner.get(1).unwrap().unwrap().status, Some(200));
    assert_eq!(inner.get(2).unwrap().unwrap().status, None);
    assert_eq!(inner.get(3).unwrap().unwrap().status, None);
}
