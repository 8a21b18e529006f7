//! Unit tests for the endpoint registry against the JSON file store

use chrono::{Duration, Utc};
use sd_bridge_gateway::pool::{
    Endpoint, EndpointRegistry, EndpointState, JsonFileStore, PoolDocument, PoolStore,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn registry_with(dir: &TempDir, endpoints: Vec<Endpoint>) -> (EndpointRegistry, Arc<JsonFileStore>) {
    let store = Arc::new(JsonFileStore::new(dir.path().join("config.json")));
    store
        .save(&PoolDocument::with_endpoints(endpoints))
        .await
        .unwrap();
    (EndpointRegistry::new(store.clone()), store)
}

fn endpoint(id: &str, max_success: u32, max_fail: u32) -> Endpoint {
    let mut endpoint = Endpoint::new(id, format!("http://{}/v1/chat/completions", id), max_success, max_fail);
    endpoint.id = id.to_string();
    endpoint
}

async fn select_id(registry: &EndpointRegistry) -> Option<String> {
    registry
        .select()
        .await
        .unwrap()
        .map(|selected| selected.endpoint.id)
}

#[tokio::test]
async fn test_quota_rotation_routes_a_a_b() {
    let dir = TempDir::new().unwrap();
    let (registry, _) = registry_with(&dir, vec![endpoint("a", 2, 3), endpoint("b", 2, 3)]).await;

    let mut routed = Vec::new();
    for _ in 0..3 {
        let id = select_id(&registry).await.unwrap();
        registry.record_outcome(&id, true).await.unwrap();
        routed.push(id);
    }

    assert_eq!(routed, vec!["a", "a", "b"]);
}

#[tokio::test]
async fn test_sticky_selection_does_not_write() {
    let dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(&dir, vec![endpoint("a", 5, 3), endpoint("b", 5, 3)]).await;
    registry.switch_to("b").await.unwrap();

    let before = store.load().await.unwrap();
    for _ in 0..3 {
        assert_eq!(select_id(&registry).await.as_deref(), Some("b"));
    }
    assert_eq!(store.load().await.unwrap(), before);
}

#[tokio::test]
async fn test_escape_valve_resets_both_and_picks_lowest() {
    let dir = TempDir::new().unwrap();
    let mut a = endpoint("a", 2, 3);
    let mut b = endpoint("b", 2, 3);
    a.success_count = 2;
    b.success_count = 2;
    let (registry, store) = registry_with(&dir, vec![a, b]).await;

    assert_eq!(select_id(&registry).await.as_deref(), Some("a"));

    let doc = store.load().await.unwrap();
    assert_eq!(doc.get("a").unwrap().success_count, 0);
    assert_eq!(doc.get("b").unwrap().success_count, 0);
}

#[tokio::test]
async fn test_banned_endpoint_excluded_until_unban() {
    let dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(&dir, vec![endpoint("a", 10, 2), endpoint("b", 10, 2)]).await;
    assert_eq!(select_id(&registry).await.as_deref(), Some("a"));

    registry.record_outcome("a", false).await.unwrap();
    let effect = registry.record_outcome("a", false).await.unwrap().unwrap();
    assert!(effect.banned);
    assert_eq!(effect.rotated_to.as_deref(), Some("b"));

    let doc = store.load().await.unwrap();
    let a = doc.get("a").unwrap();
    assert_eq!(a.state(), EndpointState::Banned);
    assert_eq!(a.consecutive_fail_count, a.max_fail_count);
    assert!(a.banned_until.unwrap() > Utc::now() + Duration::hours(23));

    // Even a manual pin cannot make a banned endpoint selectable
    registry.switch_to("a").await.unwrap();
    assert_eq!(select_id(&registry).await.as_deref(), Some("b"));

    registry.unban("a").await.unwrap();
    registry.switch_to("a").await.unwrap();
    assert_eq!(select_id(&registry).await.as_deref(), Some("a"));
    assert_eq!(
        store.load().await.unwrap().get("a").unwrap().consecutive_fail_count,
        0
    );
}

#[tokio::test]
async fn test_expired_ban_cleared_on_next_selection() {
    let dir = TempDir::new().unwrap();
    let mut a = endpoint("a", 10, 1);
    a.record_failure(Utc::now() - Duration::hours(48), 24);
    let (registry, store) = registry_with(&dir, vec![a]).await;

    assert_eq!(select_id(&registry).await.as_deref(), Some("a"));
    let doc = store.load().await.unwrap();
    assert!(!doc.get("a").unwrap().is_banned);
    assert_eq!(doc.get("a").unwrap().total_fail, 1);

    // A second sweep has nothing left to do
    assert_eq!(registry.sweep_expired_bans().await.unwrap(), 0);
}

#[tokio::test]
async fn test_all_banned_or_disabled_selects_nothing() {
    let dir = TempDir::new().unwrap();
    let mut a = endpoint("a", 10, 3);
    a.is_banned = true;
    let mut b = endpoint("b", 10, 3);
    b.enabled = false;
    let (registry, _) = registry_with(&dir, vec![a, b]).await;

    assert_eq!(select_id(&registry).await, None);
}

#[tokio::test]
async fn test_status_reports_current_and_ban_remaining() {
    let dir = TempDir::new().unwrap();
    let (registry, _) = registry_with(&dir, vec![endpoint("a", 10, 1), endpoint("b", 10, 1)]).await;
    registry.switch_to("a").await.unwrap();
    registry.record_outcome("a", false).await.unwrap();

    let status = registry.status().await.unwrap();
    assert_eq!(status.current_api_id.as_deref(), Some("b"));

    let a = &status.api_endpoints[0];
    assert!(!a.is_available);
    assert!(!a.is_current);
    assert!(a.ban_remaining_seconds.unwrap() > 0);

    let b = &status.api_endpoints[1];
    assert!(b.is_current);
    assert_eq!(b.state, EndpointState::Available);
}

#[tokio::test]
async fn test_reset_stats_keeps_endpoint_in_place() {
    let dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(&dir, vec![endpoint("a", 10, 1)]).await;
    registry.record_outcome("a", true).await.unwrap();
    registry.record_outcome("a", false).await.unwrap();

    registry.reset_stats("a").await.unwrap();

    let doc = store.load().await.unwrap();
    let a = doc.get("a").unwrap();
    assert_eq!(a.total_success, 0);
    assert_eq!(a.total_fail, 0);
    assert!(a.is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_outcomes_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(&dir, vec![endpoint("a", 1000, 3)]).await;
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.record_outcome("a", true).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let doc = store.load().await.unwrap();
    assert_eq!(doc.get("a").unwrap().total_success, 32);
    assert_eq!(doc.get("a").unwrap().success_count, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_selection_agrees_on_pin() {
    let dir = TempDir::new().unwrap();
    let mut a = endpoint("a", 10, 3);
    a.is_banned = true;
    let (registry, store) = registry_with(&dir, vec![a, endpoint("b", 10, 3), endpoint("c", 10, 3)]).await;
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { select_id(&registry).await })
        })
        .collect();

    let mut picked = Vec::new();
    for handle in handles {
        picked.push(handle.await.unwrap());
    }

    assert!(picked.iter().all(|id| id.as_deref() == Some("b")));
    assert_eq!(store.load().await.unwrap().current_api_id.as_deref(), Some("b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_ban_exactly_once() {
    let dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(&dir, vec![endpoint("a", 10, 5), endpoint("b", 10, 5)]).await;
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.record_outcome("a", false).await.unwrap() })
        })
        .collect();

    let mut bans = 0;
    for handle in handles {
        if handle.await.unwrap().map_or(false, |effect| effect.banned) {
            bans += 1;
        }
    }

    assert_eq!(bans, 1);
    let doc = store.load().await.unwrap();
    assert_eq!(doc.get("a").unwrap().consecutive_fail_count, 5);
    assert_eq!(doc.current_api_id.as_deref(), Some("b"));
}
