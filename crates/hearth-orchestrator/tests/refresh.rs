//! Status refresh on listing: probe throttling and partial failures.

mod common;

use common::*;
use hearth_orchestrator::{ErrorKind, ListQuery, OrchestratorError};
use hearth_state::*;

fn refresh() -> ListQuery {
    ListQuery {
        refresh_status: true,
        names: None,
    }
}

fn set_status(h: &Harness, name: &str, status: StatusInfo) {
    h.registry.merge(name, &ServerPatch::status(status)).unwrap();
}

#[tokio::test]
async fn plain_listing_never_stamps() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    h.seed_server("b", Some("i-b"));

    let servers = h
        .service
        .list_servers(&newcomer(), &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(servers.len(), 2);
    assert!(h.registry.scan_all().unwrap().iter().all(|s| s.status.is_none()));
    assert!(h.executor.dispatched().is_empty());
}

#[tokio::test]
async fn refresh_stamps_then_probes_stale_servers() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    h.seed_server("pending", None);

    let before = epoch_millis();
    let servers = h.service.list_servers(&newcomer(), &refresh()).await.unwrap();

    let a = servers.iter().find(|s| s.name == "a").unwrap();
    let stamped = a.status.as_ref().and_then(|s| s.last_request).unwrap();
    assert!(stamped >= before);
    assert_eq!(h.server("a").status.unwrap().last_request, Some(stamped));
    assert!(h.server("pending").status.is_none());

    let dispatched = h.executor.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, "server-status");
    assert_eq!(dispatched[0].1["instanceId"], "i-a");
}

#[tokio::test]
async fn second_refresh_within_window_does_not_probe_again() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));

    h.service.list_servers(&newcomer(), &refresh()).await.unwrap();
    h.service.list_servers(&newcomer(), &refresh()).await.unwrap();

    assert_eq!(h.executor.dispatched().len(), 1);
}

#[tokio::test]
async fn concurrent_refreshes_probe_once() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    let caller = newcomer();
    let query = refresh();

    let (first, second) = tokio::join!(
        h.service.list_servers(&caller, &query),
        h.service.list_servers(&caller, &query),
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(h.executor.dispatched().len(), 1);
}

#[tokio::test]
async fn fresh_update_suppresses_probe() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    set_status(
        &h,
        "a",
        StatusInfo {
            status: Some("running".into()),
            last_updated: Some(epoch_millis() - 5_000),
            ..StatusInfo::default()
        },
    );

    h.service.list_servers(&newcomer(), &refresh()).await.unwrap();
    assert!(h.executor.dispatched().is_empty());
}

#[tokio::test]
async fn stale_request_and_update_probe_again() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    let now = epoch_millis();
    set_status(
        &h,
        "a",
        StatusInfo {
            address: Some("203.0.113.7".into()),
            last_request: Some(now - 60_000),
            last_updated: Some(now - 45_000),
            ..StatusInfo::default()
        },
    );

    h.service.list_servers(&newcomer(), &refresh()).await.unwrap();
    assert_eq!(h.executor.dispatched().len(), 1);

    // The stamp keeps the rest of the status sub-object.
    let status = h.server("a").status.unwrap();
    assert_eq!(status.address.as_deref(), Some("203.0.113.7"));
    assert!(status.last_request.unwrap() >= now);
}

#[tokio::test]
async fn probe_failure_is_partial_failure_with_listing() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    h.seed_server("b", Some("i-b"));
    h.executor.fail_task("server-status");

    let err = h
        .service
        .list_servers(&newcomer(), &refresh())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    match err {
        OrchestratorError::PartialRefresh { failed, servers } => {
            assert_eq!(failed, 2);
            assert_eq!(servers.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn name_batches() {
    let h = Harness::new();
    h.seed_server("a", Some("i-a"));
    h.seed_server("b", Some("i-b"));

    let query = |names: Vec<&str>| ListQuery {
        refresh_status: false,
        names: Some(names.into_iter().map(str::to_string).collect()),
    };

    let servers = h
        .service
        .list_servers(&newcomer(), &query(vec!["b", "nope"]))
        .await
        .unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].name, "b");

    let err = h
        .service
        .list_servers(&newcomer(), &query(vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientError);

    let err = h
        .service
        .list_servers(&newcomer(), &query(vec!["nope"]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoServers));
    assert_eq!(err.kind(), ErrorKind::ServerError);
}
