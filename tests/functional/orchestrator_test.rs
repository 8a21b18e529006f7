//! Functional tests for call orchestration against a mock upstream

use sd_bridge_gateway::backend::{ChatMessage, HttpBackend};
use sd_bridge_gateway::gateway::CallOrchestrator;
use sd_bridge_gateway::pool::{Endpoint, EndpointRegistry, MemoryStore, PoolDocument};
use sd_bridge_gateway::AppError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(id: &str, url: String, max_fail: u32) -> Endpoint {
    let mut endpoint = Endpoint::new(id, url, 10, max_fail);
    endpoint.id = id.to_string();
    endpoint.model = format!("model-{}", id);
    endpoint
}

fn setup(endpoints: Vec<Endpoint>, retry_count: u32) -> (CallOrchestrator, Arc<EndpointRegistry>) {
    setup_with_timeout(endpoints, retry_count, 5)
}

fn setup_with_timeout(
    endpoints: Vec<Endpoint>,
    retry_count: u32,
    timeout_secs: u64,
) -> (CallOrchestrator, Arc<EndpointRegistry>) {
    let mut doc = PoolDocument::with_endpoints(endpoints);
    doc.request_retry_count = retry_count;
    doc.request_retry_delay = 0.0;
    doc.timeout = timeout_secs;

    let registry = Arc::new(EndpointRegistry::new(Arc::new(MemoryStore::new(doc))));
    let backend = Arc::new(HttpBackend::new(Duration::from_secs(5)).unwrap());
    (CallOrchestrator::new(registry.clone(), backend), registry)
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::user("a cat --no blurry".to_string())]
}

fn chat_body() -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": "![img](http://x/y.png)"}}]})
}

#[tokio::test]
async fn test_request_carries_credential_and_endpoint_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut a = endpoint("a", format!("{}/v1/chat/completions", server.uri()), 3);
    a.api_key = "secret-key".to_string();
    let (orchestrator, registry) = setup(vec![a], 2);

    let outcome = orchestrator.call(&messages()).await.unwrap();
    assert_eq!(outcome.endpoint_id, "a");
    assert_eq!(outcome.response, chat_body());

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "messages": [{"role": "user", "content": "a cat --no blurry"}],
            "model": "model-a"
        })
    );

    let doc = registry.document().await.unwrap();
    assert_eq!(doc.get("a").unwrap().success_count, 1);
    assert_eq!(doc.get("a").unwrap().total_success, 1);
}

#[tokio::test]
async fn test_no_authorization_header_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body()))
        .mount(&server)
        .await;

    let (orchestrator, _) = setup(vec![endpoint("a", server.uri(), 3)], 0);
    orchestrator.call(&messages()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0]
        .headers
        .iter()
        .any(|(name, _)| name.as_str().eq_ignore_ascii_case("authorization")));
}

#[tokio::test]
async fn test_retries_same_endpoint_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body()))
        .mount(&server)
        .await;

    let (orchestrator, registry) = setup(vec![endpoint("a", server.uri(), 3)], 2);
    let outcome = orchestrator.call(&messages()).await.unwrap();

    assert_eq!(outcome.endpoint_id, "a");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    // Failed attempts inside one retry budget are not recorded
    let doc = registry.document().await.unwrap();
    assert_eq!(doc.get("a").unwrap().total_fail, 0);
}

#[tokio::test]
async fn test_error_marker_counts_as_failure() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": {"message": "quota"}})))
        .expect(2)
        .mount(&failing)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body()))
        .expect(1)
        .mount(&healthy)
        .await;

    let (orchestrator, registry) = setup(
        vec![endpoint("a", failing.uri(), 1), endpoint("b", healthy.uri(), 1)],
        1,
    );

    let outcome = orchestrator.call(&messages()).await.unwrap();
    assert_eq!(outcome.endpoint_id, "b");

    let doc = registry.document().await.unwrap();
    assert!(doc.get("a").unwrap().is_banned);
    assert_eq!(doc.current_api_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_banned_after_repeated_exhaustion_then_excluded() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body()))
        .mount(&healthy)
        .await;

    let (orchestrator, registry) = setup(
        vec![endpoint("a", failing.uri(), 2), endpoint("b", healthy.uri(), 2)],
        0,
    );

    // First call: a fails once, not yet banned, no failover
    let err = orchestrator.call(&messages()).await.unwrap_err();
    assert!(matches!(err, AppError::EndpointsExhausted { ref endpoint, .. } if endpoint == "a"));

    // Second call: a reaches its threshold, is banned, b takes over
    let outcome = orchestrator.call(&messages()).await.unwrap();
    assert_eq!(outcome.endpoint_id, "b");

    // a stays out of rotation
    orchestrator.call(&messages()).await.unwrap();
    assert_eq!(failing.received_requests().await.unwrap().len(), 2);

    let doc = registry.document().await.unwrap();
    let a = doc.get("a").unwrap();
    assert!(a.is_banned);
    assert_eq!(a.consecutive_fail_count, 2);
    assert_eq!(a.ban_reason, "2 consecutive failures");
}

#[tokio::test]
async fn test_malformed_body_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let (orchestrator, _) = setup(vec![endpoint("a", server.uri(), 3)], 2);
    let err = orchestrator.call(&messages()).await.unwrap_err();

    match err {
        AppError::EndpointsExhausted { endpoint, last_error } => {
            assert_eq!(endpoint, "a");
            assert!(last_error.contains("Malformed upstream response"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_failure() {
    // Nothing listens on port 9 (discard) in the test environment
    let (orchestrator, registry) = setup(vec![endpoint("a", "http://127.0.0.1:9/v1".to_string(), 1)], 0);

    let err = orchestrator.call(&messages()).await.unwrap_err();
    match err {
        AppError::EndpointsExhausted { last_error, .. } => assert!(last_error.contains("Network error")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(registry.document().await.unwrap().get("a").unwrap().is_banned);
}

#[tokio::test]
async fn test_slow_upstream_times_out_and_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (orchestrator, registry) = setup_with_timeout(vec![endpoint("a", server.uri(), 3)], 1, 1);
    let err = orchestrator.call(&messages()).await.unwrap_err();

    match err {
        AppError::EndpointsExhausted { endpoint, last_error } => {
            assert_eq!(endpoint, "a");
            assert!(last_error.contains("timed out"), "{}", last_error);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let doc = registry.document().await.unwrap();
    assert_eq!(doc.get("a").unwrap().consecutive_fail_count, 1);
    assert_eq!(doc.get("a").unwrap().total_success, 0);
}
