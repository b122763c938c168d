//! HTTP endpoint tests for the scipip API.
//!
//! Drives the real router with `tower::ServiceExt::oneshot`; the pipeline
//! runs against scripted in-memory capabilities.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use scipip_core::testing::{FakeCapabilities, Reply};
use scipip_core::{AppContext, ServiceConfig};
use scipip_server::{ApiState, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app_with(fake: &Arc<FakeCapabilities>, origins: &[&str]) -> Router {
    let ctx = AppContext::with_capabilities(ServiceConfig::default(), fake.capabilities());
    let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
    build_router(ApiState::new(ctx), &origins)
}

fn app(fake: &Arc<FakeCapabilities>) -> Router {
    app_with(fake, &["*"])
}

fn post_generate(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn index_describes_endpoints() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app(&fake)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["service"], "scipip");
    assert!(json["endpoints"]["generate"].is_string());
}

#[tokio::test]
async fn health_endpoint() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app(&fake)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["backend_ready"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn buffered_generate_returns_every_artifact() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app(&fake)
        .oneshot(post_generate(json!({"background": "Graph learning for drugs"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(
        json["entities_bg"],
        json!(["graph neural networks", "drug discovery"])
    );
    assert_eq!(
        json["expanded_background"],
        "Expanded: Graph learning for drugs"
    );
    assert_eq!(
        json["entities_all"],
        json!(["drug discovery", "graph neural networks", "molecular graphs"])
    );
    assert_eq!(json["related_works_count"], 2);
    assert_eq!(json["initial_ideas_count"], 3);
    assert_eq!(json["final_ideas_count"], 2);
    assert_eq!(json["ideas"][2]["idea_in_detail"], Value::Null);
    assert_eq!(fake.call_count(), 6);
}

#[tokio::test]
async fn empty_background_is_a_client_error() {
    for stream in [false, true] {
        let fake = Arc::new(FakeCapabilities::happy());
        let response = app(&fake)
            .oneshot(post_generate(json!({"background": "   ", "stream": stream})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Empty background provided");
        assert_eq!(json["kind"], "client_input");
        assert_eq!(fake.call_count(), 0);
    }
}

#[tokio::test]
async fn missing_background_is_rejected() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app(&fake)
        .oneshot(post_generate(json!({"stream": false})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "client_input");
    let detail = json["detail"].as_str().unwrap();
    assert!(detail.starts_with("Invalid request: "), "{detail}");
    assert!(detail.contains("background"), "{detail}");
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_rendered_as_error_body() {
    let fake = Arc::new(FakeCapabilities::happy());
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"background\": "))
        .unwrap();
    let response = app(&fake).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "client_input");
    assert!(json["detail"].as_str().unwrap().starts_with("Invalid request: "));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn stage_failure_is_a_server_error() {
    let fake = Arc::new(FakeCapabilities {
        brainstorm: Reply::Fail("model offline".into()),
        ..FakeCapabilities::happy()
    });
    let response = app(&fake)
        .oneshot(post_generate(json!({"background": "Graph learning"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Brainstorming failed: model offline");
    assert_eq!(json["kind"], "stage_failure");
    assert!(json.get("status").is_none());
}

#[tokio::test]
async fn streaming_generate_sends_sse_frames() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app(&fake)
        .oneshot(post_generate(
            json!({"background": "Graph learning for drugs", "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events: Vec<Value> = body
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let data = frame.strip_prefix("data: ").expect("data frame");
            serde_json::from_str(data).unwrap()
        })
        .collect();

    assert_eq!(events.len(), 13);
    assert_eq!(events[0]["type"], "query_received");
    assert_eq!(events[1]["type"], "step_start");
    assert_eq!(events[1]["data"]["step"], "extract_entities");
    assert_eq!(events[2]["type"], "step_complete");
    assert_eq!(events[12]["type"], "final_result");
    assert_eq!(events[12]["data"]["initial_ideas_count"], 3);
    assert_eq!(events[12]["data"]["final_ideas_count"], 2);
}

#[tokio::test]
async fn streaming_failure_ends_with_error_event() {
    let fake = Arc::new(FakeCapabilities {
        expansion: Reply::Nothing,
        ..FakeCapabilities::happy()
    });
    let response = app(&fake)
        .oneshot(post_generate(json!({"background": "Graph learning", "stream": true})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let last = body
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .last()
        .and_then(|frame| frame.strip_prefix("data: "))
        .map(|data| serde_json::from_str::<Value>(data).unwrap())
        .unwrap();

    assert_eq!(last["type"], "error");
    assert_eq!(last["data"]["step"], "expand_background");
    assert_eq!(
        last["data"]["message"],
        "Failed to expand background (API timeout or error)"
    );
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let fake = Arc::new(FakeCapabilities::happy());
    let response = app_with(&fake, &["http://dashboard.test"])
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://dashboard.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://dashboard.test"
    );
}
