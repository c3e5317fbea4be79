//! HTTP API tests, served in-process

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use launchpad::server::serve::router;
use launchpad::server::state::ServerState;

use crate::support::{harness, wait_idle, Harness, KEY};

fn app(h: &Harness) -> Router {
    let (shutdown, _) = broadcast::channel(1);
    router(Arc::new(ServerState::new(h.orchestrator.clone(), shutdown)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_body() -> Value {
    json!({
        "repository_url": "https://example.com/org/my-app.git",
        "domain": "example.com",
        "credentials": { "ssh_private_key": KEY }
    })
}

#[tokio::test(start_paused = true)]
async fn test_health() {
    let h = harness();
    let (status, body) = send(&app(&h), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "launchpad");
}

#[tokio::test(start_paused = true)]
async fn test_create_then_get() {
    let h = harness();
    let app = app(&h);

    let (status, body) = send(&app, Method::POST, "/deployments", Some(create_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    wait_idle(&h.orchestrator, &id).await;

    let (status, body) = send(&app, Method::GET, &format!("/deployments/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["status"], "success");
    assert_eq!(body["resourceName"], "my-app");
    assert_eq!(body["url"], "https://my-app.example.com");
    assert!(body["logEntries"].as_array().unwrap().len() > 7);
    assert!(!body.to_string().contains("PRIVATE KEY"));

    let (status, body) = send(&app, Method::GET, "/deployments?status=success", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::GET, "/deployments?status=failed", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_with_caller_id() {
    let h = harness();
    let app = app(&h);

    let mut body = create_body();
    body["id"] = json!("dep-42");
    let (status, created) = send(&app, Method::POST, "/deployments", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "dep-42");

    let (status, _) = send(&app, Method::POST, "/deployments", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_requests_are_bad_requests() {
    let h = harness();
    let app = app(&h);

    let (status, body) = send(
        &app,
        Method::POST,
        "/deployments",
        Some(json!({ "repository_url": "https://example.com/org/app" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));

    let (status, _) = send(&app, Method::POST, "/deployments", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/deployments?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_deployment_is_404() {
    let h = harness();
    let app = app(&h);

    for (method, uri) in [
        (Method::GET, "/deployments/nope"),
        (Method::POST, "/deployments/nope/redeploy"),
        (Method::DELETE, "/deployments/nope"),
        (Method::DELETE, "/deployments/nope/force"),
    ] {
        let (status, body) = send(&app, method.clone(), uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_conflicts_while_deploying() {
    let h = harness();
    let app = app(&h);

    let (_, body) = send(&app, Method::POST, "/deployments", Some(create_body())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::POST, &format!("/deployments/{}/redeploy", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    wait_idle(&h.orchestrator, &id).await;
    let (status, _) = send(&app, Method::POST, &format!("/deployments/{}/redeploy", id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test(start_paused = true)]
async fn test_delete_and_force_delete() {
    let h = harness();
    let app = app(&h);

    let (_, body) = send(&app, Method::POST, "/deployments", Some(create_body())).await;
    let first = body["id"].as_str().unwrap().to_string();
    wait_idle(&h.orchestrator, &first).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/deployments/{}", first), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_idle(&h.orchestrator, &first).await;
    let (status, _) = send(&app, Method::GET, &format!("/deployments/{}", first), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut body = create_body();
    body["instance_name"] = json!("second");
    let (_, body) = send(&app, Method::POST, "/deployments", Some(body)).await;
    let second = body["id"].as_str().unwrap().to_string();

    let (status, _) =
        send(&app, Method::DELETE, &format!("/deployments/{}/force", second), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/deployments", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_endpoint_streams_sse() {
    let h = harness();
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/deployments/dep-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}

#[tokio::test(start_paused = true)]
async fn test_events_stream_ends_on_shutdown() {
    let h = harness();
    let (shutdown, _) = broadcast::channel(1);
    let app = router(Arc::new(ServerState::new(
        h.orchestrator.clone(),
        shutdown.clone(),
    )));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/deployments/dep-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.orchestrator.bus().subscriber_count("dep-1"), 1);

    shutdown.send(()).unwrap();
    let body = tokio::time::timeout(
        Duration::from_secs(60),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("event stream kept the response open");
    assert!(body.is_ok());
    assert_eq!(h.orchestrator.bus().subscriber_count("dep-1"), 0);
}
