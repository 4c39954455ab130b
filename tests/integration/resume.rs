use std::sync::Arc;

use itemsync::store::{CatalogStore, SledCatalogStore};
use itemsync::StatusPolicy;
use tempfile::TempDir;

use crate::integration::support::{
    item_path, orchestrator, serve_catalog, test_config, MockTransport, API_HOST,
};

fn open_store(dir: &TempDir) -> Arc<SledCatalogStore> {
    let path = dir.path().join("items.db");
    Arc::new(SledCatalogStore::open(&path, StatusPolicy::default()).unwrap())
}

#[tokio::test]
async fn interrupted_sweep_resumes_from_the_catalog() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1, 2, 3, 4]);
    transport.item(1, 200, "one");
    transport.item(2, 500, "");
    transport.item(4, 404, "");

    {
        let store = open_store(&dir);
        let report = orchestrator(&test_config(), &transport, &store)
            .run()
            .await
            .unwrap();
        assert_eq!(report.enrichment.still_pending(), 2);
    }

    transport.item(2, 200, "two");
    transport.item(3, 200, "three");
    transport.clear_calls();

    let store = open_store(&dir);
    assert_eq!(store.get(1).unwrap().unwrap().payload.as_deref(), Some(&b"one"[..]));
    assert_eq!(store.stats().unwrap().pending(), 2);

    let report = orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap();

    assert_eq!(report.discovery.ids_inserted, 0);
    assert_eq!(report.enrichment.succeeded, 2);
    assert_eq!(transport.item_calls(), vec![2, 3]);

    let stats = store.stats().unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.absent, 1);
    assert_eq!(stats.pending(), 0);
}

#[tokio::test]
async fn new_ids_are_picked_up_on_a_later_run() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1]);
    transport.item(1, 200, "one");

    {
        let store = open_store(&dir);
        orchestrator(&test_config(), &transport, &store)
            .run()
            .await
            .unwrap();
    }

    serve_catalog(&transport, &[1, 2]);
    transport.item(2, 200, "two");
    transport.clear_calls();

    let store = open_store(&dir);
    let report = orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap();

    assert_eq!(report.discovery.ids_inserted, 1);
    assert_eq!(transport.item_calls(), vec![2]);
}

#[tokio::test]
async fn failed_lookup_survives_reopen_as_pending() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    serve_catalog(&transport, &[9]);
    transport.item(9, 200, "nine");

    {
        let store = open_store(&dir);
        let sync = orchestrator(&test_config(), &transport, &store);
        sync.discover().await.unwrap();
    }

    let store = open_store(&dir);
    let pending: Vec<_> = store.list_pending().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(pending, vec![9]);

    transport.unroute(API_HOST, &item_path(9));
    let report = orchestrator(&test_config(), &transport, &store)
        .enrich()
        .await
        .unwrap();
    assert_eq!(report.transport_failures, 1);
    assert_eq!(store.get(9).unwrap().unwrap().status, None);
}
