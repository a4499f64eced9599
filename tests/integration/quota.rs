//! Quota integration tests
//!
//! Tests for the quota gate and usage accounting:
//! - Exhausted projects rejected before any outbound call
//! - Store outages fail closed
//! - One usage unit per relayed response

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{as_principal, as_project, constants, received, TestHarness};

async fn mount_ok(harness: &TestHarness) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "chatcmpl-1"})))
        .mount(&harness.upstream)
        .await;
}

#[tokio::test]
async fn test_exhausted_project_gets_payment_required() {
    let harness = TestHarness::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.upstream)
        .await;
    harness.limiter.set_usage(constants::TEST_PROJECT_ID, constants::TEST_DEFAULT_LIMIT);

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "ai_tokens_limit_exceeded");
    assert_eq!(json["error"]["param"], json!({}));
    assert!(json["error"]["message"].is_string());

    assert!(harness.dispatcher.targets().is_empty());
    assert_eq!(harness.limiter.increment_calls(), 0);
    assert_eq!(
        harness.limiter.project_usage(constants::TEST_PROJECT_ID),
        constants::TEST_DEFAULT_LIMIT
    );
}

#[tokio::test]
async fn test_per_project_limit_overrides_default() {
    let harness = TestHarness::new().await;
    mount_ok(&harness).await;
    harness.limiter.set_usage(constants::TEST_PROJECT_ID, constants::TEST_DEFAULT_LIMIT);
    harness.limiter.set_limit(constants::TEST_PROJECT_ID, constants::TEST_DEFAULT_LIMIT * 2);

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status_ok();
    assert_eq!(
        harness.limiter.project_usage(constants::TEST_PROJECT_ID),
        constants::TEST_DEFAULT_LIMIT + 1
    );
}

#[tokio::test]
async fn test_last_unit_is_served_then_blocked() {
    let harness = TestHarness::new().await;
    mount_ok(&harness).await;
    harness.limiter.set_limit(constants::TEST_PROJECT_ID, 1);

    let first = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;
    first.assert_status_ok();

    let second = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;
    second.assert_status(StatusCode::PAYMENT_REQUIRED);

    assert_eq!(received(&harness.upstream).await.len(), 1);
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let harness = TestHarness::new().await;
    mount_ok(&harness).await;
    harness.limiter.set_unavailable(true);

    let response = as_project(harness.server.post("/openai/chat/completions"))
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert_eq!(json, json!({"message": "An unexpected error occurred in the proxy"}));
    assert!(received(&harness.upstream).await.is_empty());
    assert_eq!(harness.events.error_kinds(), vec!["quota_store_unavailable".to_string()]);
}

#[tokio::test]
async fn test_rejected_requests_are_not_accounted() {
    let harness = TestHarness::new().await;

    // Unknown provider, then missing principal
    as_project(harness.server.post("/cohere/v1/chat"))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    harness
        .server
        .post("/openai/chat/completions")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(harness.limiter.increment_calls(), 0);
    assert_eq!(harness.limiter.platform_usage(), 0);
}

#[tokio::test]
async fn test_each_relayed_request_accounted_once() {
    let harness = TestHarness::new().await;
    mount_ok(&harness).await;

    for _ in 0..20 {
        as_project(harness.server.post("/openai/chat/completions"))
            .json(&json!({"model": "gpt-4o"}))
            .await
            .assert_status_ok();
    }

    assert_eq!(received(&harness.upstream).await.len(), 20);
    assert_eq!(harness.limiter.project_usage(constants::TEST_PROJECT_ID), 20);
    assert_eq!(harness.limiter.organization_usage(constants::TEST_ORG_ID), 20);
    assert_eq!(harness.limiter.platform_usage(), 20);
    assert_eq!(harness.limiter.increment_calls(), 20);
}

#[tokio::test]
async fn test_usage_rolls_up_per_organization() {
    let harness = TestHarness::new().await;
    mount_ok(&harness).await;

    for project in ["proj_a", "proj_b"] {
        as_principal(harness.server.post("/openai/chat/completions"), project, Some("org_shared"))
            .json(&json!({"model": "gpt-4o"}))
            .await
            .assert_status_ok();
    }
    as_principal(harness.server.post("/openai/chat/completions"), "proj_solo", None)
        .json(&json!({"model": "gpt-4o"}))
        .await
        .assert_status_ok();

    assert_eq!(harness.limiter.project_usage("proj_a"), 1);
    assert_eq!(harness.limiter.project_usage("proj_b"), 1);
    assert_eq!(harness.limiter.project_usage("proj_solo"), 1);
    assert_eq!(harness.limiter.organization_usage("org_shared"), 2);
    assert_eq!(harness.limiter.platform_usage(), 3);
}
