use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use octostats::{create_app, queue::EventQueue, AppState};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

#[tokio::test]
async fn test_health_check() {
    // 1. Setup state
    let (queue, _receiver) = EventQueue::new();
    let app = create_app(Arc::new(AppState::new(queue)));

    // 2. Send request
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // 3. Assert
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    assert_eq!(body_json["status"], "ok");
    assert_eq!(body_json["service"], "octostats");
}

#[tokio::test]
async fn test_webhook_is_queued() {
    let (queue, mut receiver) = EventQueue::new();
    let app = create_app(Arc::new(AppState::new(queue)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/github")
                .header("X-GitHub-Delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
                .header("X-GitHub-Event", "pull_request")
                .body(Body::from(r#"{"action":"closed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let event = receiver.recv().await.unwrap();
    assert_eq!(
        event.delivery_id.as_deref(),
        Some("72d3162e-cc78-11e3-81ab-4c9367dc0958")
    );
    assert_eq!(event.payload, br#"{"action":"closed"}"#.to_vec());
}

#[tokio::test]
async fn test_webhook_without_delivery_id() {
    let (queue, mut receiver) = EventQueue::new();
    let app = create_app(Arc::new(AppState::new(queue)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/github")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(receiver.recv().await.unwrap().delivery_id, None);
}

#[tokio::test]
async fn test_webhook_rejected_when_consumer_is_gone() {
    let (queue, receiver) = EventQueue::new();
    drop(receiver);
    let app = create_app(Arc::new(AppState::new(queue)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/github")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_webhook_route_rejects_get() {
    let (queue, _receiver) = EventQueue::new();
    let app = create_app(Arc::new(AppState::new(queue)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/webhooks/github")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
