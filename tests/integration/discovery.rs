use itemsync::error::{DiscoveryError, SyncError};
use itemsync::index::MAX_INDEX_DEPTH;
use itemsync::store::{CatalogStore, Record};
use itemsync::transport::Response;

use crate::integration::support::{
    orchestrator, serve_catalog, sitemap_index, temp_store, test_config, urlset, MockTransport,
    API_HOST, INDEX_HOST,
};

#[tokio::test]
async fn discover_inserts_ids_from_item_indexes_only() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[12, 10, 11]);
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap();

    assert_eq!(report.indexes_walked, 2);
    assert_eq!(report.ids_extracted, 3);
    assert_eq!(report.ids_inserted, 3);

    let pending: Vec<_> = store.list_pending().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(pending, vec![10, 11, 12]);
    assert!(transport
        .calls()
        .iter()
        .all(|(host, path)| host == INDEX_HOST && path != "/sitemap=npc/1"));
}

#[tokio::test]
async fn rediscovery_never_regresses_finished_records() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[1, 2]);
    let store = temp_store();
    let sync = orchestrator(&test_config(), &transport, &store);

    sync.discover().await.unwrap();
    store.record_result(1, 200, Some(b"{\"id\":1}".to_vec())).unwrap();
    store.record_result(2, 404, None).unwrap();

    let report = sync.discover().await.unwrap();
    assert_eq!(report.ids_extracted, 2);
    assert_eq!(report.ids_inserted, 0);

    let first = store.get(1).unwrap().unwrap();
    assert_eq!(first.status, Some(200));
    assert_eq!(first.payload.as_deref(), Some(&b"{\"id\":1}"[..]));
    assert_eq!(store.get(2).unwrap().unwrap().status, Some(404));
    assert!(store.list_pending().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_ids_across_indexes_are_stored_once() {
    let transport = MockTransport::new();
    transport.index(
        "/sitemap",
        &sitemap_index(&["/sitemap=item/1", "/sitemap=item/2"]),
    );
    transport.index("/sitemap=item/1", &urlset(&[5, 6]));
    transport.index("/sitemap=item/2", &urlset(&[6, 7]));
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap();

    assert_eq!(report.ids_extracted, 4);
    assert_eq!(report.ids_inserted, 3);
    assert_eq!(store.stats().unwrap().total, 3);
    assert_eq!(store.get(6).unwrap(), Some(Record::new_pending(6)));
}

#[tokio::test]
async fn self_referencing_index_is_fetched_once() {
    let transport = MockTransport::new();
    transport.index(
        "/sitemap",
        &sitemap_index(&["/sitemap=item/1", "/sitemap=item/1"]),
    );
    transport.index(
        "/sitemap=item/1",
        &sitemap_index(&["/sitemap=item/1"]),
    );
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap();

    assert_eq!(report.indexes_walked, 2);
    assert_eq!(report.ids_extracted, 0);
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn malformed_index_aborts_before_any_catalog_change_or_lookup() {
    let transport = MockTransport::new();
    transport.index(
        "/sitemap",
        &sitemap_index(&["/sitemap=item/1", "/sitemap=item/2"]),
    );
    transport.index("/sitemap=item/1", &urlset(&[1, 2]));
    transport.index("/sitemap=item/2", "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\"><url><loc>");
    let store = temp_store();

    let err = orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Discovery(DiscoveryError::Malformed { .. })
    ));
    assert_eq!(store.stats().unwrap().total, 0);
    assert!(transport.calls().iter().all(|(host, _)| host != API_HOST));
}

#[tokio::test]
async fn index_error_status_is_a_discovery_failure() {
    let transport = MockTransport::new();
    transport.route(
        INDEX_HOST,
        "/sitemap",
        Response::new(503, "Service Unavailable", Vec::new()),
    );
    let store = temp_store();

    let err = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap_err();

    match err {
        SyncError::Discovery(DiscoveryError::Status { path, status, .. }) => {
            assert_eq!(path, "/sitemap");
            assert_eq!(status, 503);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_index_host_is_a_discovery_failure() {
    let transport = MockTransport::new();
    let store = temp_store();

    let err = orchestrator(&test_config(), &transport, &store)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Discovery(DiscoveryError::Transport(_))
    ));
}

#[tokio::test]
async fn discovery_works_without_a_credential() {
    let transport = MockTransport::new();
    serve_catalog(&transport, &[3]);
    let store = temp_store();
    let mut config = test_config();
    config.enrichment.api_key = None;

    let sync = orchestrator(&config, &transport, &store);
    assert!(!sync.can_enrich());
    assert_eq!(sync.discover().await.unwrap().ids_inserted, 1);
}

#[tokio::test]
async fn skipped_child_indexes_are_reported() {
    let transport = MockTransport::new();
    let root = format!(
        "<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
         <sitemap><loc>https://{}/sitemap=item/1</loc></sitemap>\
         <sitemap><loc>https://mirror.example.com/sitemap=item/2</loc></sitemap>\
         </sitemapindex>",
        INDEX_HOST
    );
    transport.index("/sitemap", &root);
    transport.index("/sitemap=item/1", &urlset(&[4]));
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap();

    assert_eq!(report.child_indexes_skipped, 1);
    assert_eq!(report.ids_inserted, 1);
    assert!(transport.calls().iter().all(|(host, _)| host == INDEX_HOST));
}

#[tokio::test]
async fn child_indexes_past_depth_limit_are_counted() {
    let transport = MockTransport::new();
    transport.index("/sitemap", &sitemap_index(&["/sitemap=item/1"]));
    for level in 1..=MAX_INDEX_DEPTH {
        let next = format!("/sitemap=item/{}", level + 1);
        transport.index(&format!("/sitemap=item/{}", level), &sitemap_index(&[next.as_str()]));
    }
    let store = temp_store();

    let report = orchestrator(&test_config(), &transport, &store)
        .discover()
        .await
        .unwrap();

    assert_eq!(report.indexes_walked, MAX_INDEX_DEPTH + 1);
    assert_eq!(report.child_indexes_skipped, 1);
}
