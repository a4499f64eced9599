//! Destination protection integration tests
//!
//! Tests that no outbound traffic leaves for anything but an allowlisted
//! provider host:
//! - Misconfigured base URLs pointing elsewhere
//! - Hostile path suffixes
//! - Upstream redirects
//! - Transport failures hidden behind the generic error body

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use tollgate::providers::{ProviderConfig, StaticProviderResolver};

use crate::common::{as_project, constants, received, TestHarness};

fn forbidden_body() -> Value {
    json!({"error": "Security Violation: Access to the requested host is restricted."})
}

fn internal_body() -> Value {
    json!({"message": "An unexpected error occurred in the proxy"})
}

async fn harness_with_base(base_url: &str) -> TestHarness {
    TestHarness::with_providers(StaticProviderResolver::new().with(
        "*",
        "openai",
        ProviderConfig::new(base_url).with_header("Authorization", constants::TEST_PROVIDER_KEY),
    ))
    .await
}

#[tokio::test]
async fn test_misconfigured_host_is_forbidden() {
    let harness = harness_with_base("https://evil.example.com/v1").await;

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let json: Value = response.json();
    assert_eq!(json, forbidden_body());

    assert!(harness.dispatcher.targets().is_empty());
    assert!(received(&harness.upstream).await.is_empty());
    assert_eq!(harness.limiter.project_usage(constants::TEST_PROJECT_ID), 0);

    let events = harness.events.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].hostname, "evil.example.com");
    assert_eq!(events[0].project_id, constants::TEST_PROJECT_ID);
    assert_eq!(events[0].provider, "openai");
}

#[tokio::test]
async fn test_metadata_address_is_forbidden() {
    for base in ["https://169.254.169.254/latest", "https://[::1]/v1", "https://localhost/v1"] {
        let harness = harness_with_base(base).await;

        let response = as_project(harness.server.get("/openai/meta-data")).await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert!(harness.dispatcher.targets().is_empty(), "{base}");
    }
}

#[tokio::test]
async fn test_lookalike_hosts_are_forbidden() {
    for base in [
        "https://api.openai.com.evil.example.com/v1",
        "https://api.openai.com./v1",
        "https://evilapi.openai.com/v1",
    ] {
        let harness = harness_with_base(base).await;

        let response = as_project(harness.server.get("/openai/models")).await;

        response.assert_status(StatusCode::FORBIDDEN);
        let json: Value = response.json();
        assert_eq!(json, forbidden_body());
        assert!(harness.dispatcher.targets().is_empty(), "{base}");
    }
}

#[tokio::test]
async fn test_hostile_suffix_rejected_before_dispatch() {
    let harness = TestHarness::new().await;

    for uri in [
        "/openai//evil.example.com/v1",
        "/openai/%2F%2Fevil.example.com",
        "/openai/https:%2F%2Fevil.example.com",
        "/openai/v1/..%2Fadmin",
    ] {
        let response = as_project(harness.server.get(uri)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json, json!({"error": "Invalid target URL"}), "{uri}");
    }

    assert!(harness.dispatcher.targets().is_empty());
    assert!(received(&harness.upstream).await.is_empty());
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://169.254.169.254/latest/meta-data"),
        )
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json, internal_body());

    assert_eq!(received(&harness.upstream).await.len(), 1);
    assert_eq!(harness.limiter.project_usage(constants::TEST_PROJECT_ID), 0);
    assert_eq!(harness.events.error_kinds(), vec!["upstream_error".to_string()]);
}

#[tokio::test]
async fn test_upstream_timeout_returns_generic_error() {
    let harness = TestHarness::with_timeout(Duration::from_millis(100)).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&harness.upstream)
        .await;

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json, internal_body());
    assert_eq!(harness.limiter.project_usage(constants::TEST_PROJECT_ID), 0);
    assert_eq!(harness.events.error_kinds(), vec!["upstream_unavailable".to_string()]);
}

#[tokio::test]
async fn test_error_bodies_do_not_leak_details() {
    let harness = TestHarness::with_timeout(Duration::from_millis(100)).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&harness.upstream)
        .await;

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    let text = response.text();
    assert!(!text.contains("127.0.0.1"));
    assert!(!text.contains("api.openai.com"));
    assert!(!text.contains(constants::TEST_PROVIDER_KEY));
}
