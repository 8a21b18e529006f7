//! Unit tests for response translation with real image downloads

use sd_bridge_gateway::backend::HttpBackend;
use sd_bridge_gateway::translator::{base64, GenerationRequest, Translator};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn translator() -> Translator {
    let backend = HttpBackend::new(Duration::from_secs(5)).unwrap();
    Translator::new(Arc::new(backend))
}

fn request() -> GenerationRequest {
    GenerationRequest::from_value(json!({
        "prompt": "a cat",
        "negative_prompt": "blurry",
        "seed": 7,
        "width": "768",
        "cfg_scale": "high"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_markdown_image_is_downloaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/y.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-png".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let upstream = json!({
        "choices": [{"message": {"content": format!("![img]({}/y.png)", server.uri())}}]
    });
    let response = translator().resolve_response(&upstream, &request()).await;

    assert_eq!(response.images, vec![base64::encode(b"fake-png")]);
}

#[tokio::test]
async fn test_failed_download_yields_no_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/y.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let upstream = json!({
        "choices": [{"message": {"content": format!("![img]({}/y.png)", server.uri())}}]
    });
    let response = translator().resolve_response(&upstream, &request()).await;

    assert!(response.images.is_empty());
    assert_eq!(response.parameters["prompt"], "a cat");
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved.png"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/final.png", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/final.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"final".to_vec()))
        .mount(&server)
        .await;

    let upstream = json!({"data": [{"url": format!("{}/moved.png", server.uri())}]});
    let response = translator().resolve_response(&upstream, &request()).await;

    assert_eq!(response.images, vec![base64::encode(b"final")]);
}

#[tokio::test]
async fn test_info_echoes_coerced_parameters() {
    let upstream = json!({"data": [{"b64_json": "AAAA"}]});
    let response = translator().resolve_response(&upstream, &request()).await;

    assert_eq!(response.images, vec!["AAAA"]);

    let info: Value = serde_json::from_str(&response.info).unwrap();
    assert_eq!(info["prompt"], "a cat");
    assert_eq!(info["negative_prompt"], "blurry");
    assert_eq!(info["seed"], 7);
    assert_eq!(info["width"], 768);
    assert_eq!(info["height"], 1024);
    assert_eq!(info["steps"], 20);
    assert_eq!(info["cfg_scale"], 7.0);
    assert_eq!(info["sampler_name"], "Euler");
}
