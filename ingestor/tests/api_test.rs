use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use ingestor::{build_app, cors_layer, create_router, AppState, DeviceRegistry, ReadingStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::util::ServiceExt; // for `oneshot`

const DEVICE: &str = "device-001";
const TOKEN: &str = "secret";

fn app() -> Router {
    let registry = DeviceRegistry::new(HashMap::from([
        (DEVICE.to_string(), TOKEN.to_string()),
        ("device-002".to_string(), "token-two".to_string()),
    ]));
    create_router(AppState::new(registry, ReadingStore::new()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn submit(device_id: &str, token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/devices/{}/readings", device_id))
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Device-Token", token);
    }
    builder.body(body.into()).unwrap()
}

fn latest(device_id: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/devices/{}/readings/latest", device_id))
        .body(Body::empty())
        .unwrap()
}

fn health() -> Request<Body> {
    Request::builder().uri("/health").body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submit_then_fetch_latest() {
    let app = app();

    let (status, body) = send(
        &app,
        submit(DEVICE, Some(TOKEN), json!({"temperature": 23.4, "humidity": 55.0}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_id"], DEVICE);
    assert_eq!(body["temperature"], 23.4);
    assert_eq!(body["humidity"], 55.0);

    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    let (status, body) = send(&app, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["devices"], json!([DEVICE]));
}

#[tokio::test]
async fn client_timestamp_is_ignored() {
    let app = app();
    let body = json!({
        "temperature": 20.0,
        "humidity": 40.0,
        "timestamp": "1999-01-01T00:00:00Z",
    });

    let (status, _) = send(&app, submit(DEVICE, Some(TOKEN), body.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, latest(DEVICE)).await;
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(!timestamp.starts_with("1999"));
    let parsed = chrono::DateTime::parse_from_rfc3339(timestamp).unwrap();
    let age = chrono::Utc::now().signed_duration_since(parsed);
    assert!(age.num_seconds().abs() < 60);
}

#[tokio::test]
async fn second_submission_overwrites_first() {
    let app = app();

    for (t, h) in [(18.0, 30.0), (19.5, 31.5)] {
        let (status, _) = send(
            &app,
            submit(DEVICE, Some(TOKEN), json!({"temperature": t, "humidity": h}).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(body["temperature"], 19.5);
    assert_eq!(body["humidity"], 31.5);

    let (_, body) = send(&app, health()).await;
    assert_eq!(body["devices"], json!([DEVICE]));
}

#[tokio::test]
async fn latest_without_data_is_not_found() {
    let app = app();

    let (status, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "No data yet"}));

    // Unknown devices look the same as known devices without data.
    let (status, body) = send(&app, latest("never-registered")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No data yet");
}

#[tokio::test]
async fn wrong_or_missing_token_is_unauthorized_and_leaves_store_unchanged() {
    let app = app();
    let first = json!({"temperature": 10.0, "humidity": 20.0}).to_string();
    let (status, _) = send(&app, submit(DEVICE, Some(TOKEN), first)).await;
    assert_eq!(status, StatusCode::OK);

    let attempt = json!({"temperature": 99.0, "humidity": 99.0}).to_string();
    for token in [Some("wrong"), Some("SECRET"), Some("token-two"), None] {
        let (status, body) = send(&app, submit(DEVICE, token, attempt.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"status": "error", "message": "Unauthorized"}));
    }

    let (_, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(body["temperature"], 10.0);
    assert_eq!(body["humidity"], 20.0);
}

#[tokio::test]
async fn unknown_device_is_unauthorized() {
    let app = app();
    let body = json!({"temperature": 1.0, "humidity": 2.0}).to_string();

    let (status, body) = send(&app, submit("device-999", Some(TOKEN), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");

    let (_, body) = send(&app, health()).await;
    assert_eq!(body["devices"], json!([]));
}

#[tokio::test]
async fn authorization_is_checked_before_body() {
    let app = app();

    let (status, body) = send(&app, submit(DEVICE, Some("wrong"), "{not json")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
async fn missing_humidity_is_invalid_and_leaves_store_unchanged() {
    let app = app();

    let (status, body) = send(
        &app,
        submit(DEVICE, Some(TOKEN), json!({"temperature": 23.4}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Invalid payload: missing field 'humidity'");

    let (status, _) = send(&app, latest(DEVICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, health()).await;
    assert_eq!(body["devices"], json!([]));
}

#[tokio::test]
async fn malformed_bodies_are_invalid_payloads() {
    let app = app();

    for body in [
        "{not json",
        "",
        "[23.4, 55.0]",
        r#"{"temperature": "hot", "humidity": 50}"#,
        r#"{"temperature": 20, "humidity": null}"#,
    ] {
        let (status, resp) = send(&app, submit(DEVICE, Some(TOKEN), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        let message = resp["message"].as_str().unwrap();
        assert!(message.starts_with("Invalid payload: "), "message: {}", message);
    }
}

#[tokio::test]
async fn oversized_body_with_wrong_token_is_unauthorized() {
    let app = app();
    let padding = "x".repeat(3 * 1024 * 1024);
    let body = format!(r#"{{"temperature": 1.0, "humidity": 2.0, "note": "{}"}}"#, padding);

    let (status, resp) = send(&app, submit(DEVICE, Some("wrong"), body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp, json!({"status": "error", "message": "Unauthorized"}));

    let (status, resp) = send(&app, submit(DEVICE, None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["message"], "Unauthorized");
}

#[tokio::test]
async fn oversized_body_with_valid_token_is_invalid_payload() {
    let app = app();
    let padding = "x".repeat(ingestor::rest::MAX_BODY_BYTES + 1);
    let body = format!(r#"{{"temperature": 1.0, "humidity": 2.0, "note": "{}"}}"#, padding);

    let (status, resp) = send(&app, submit(DEVICE, Some(TOKEN), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["status"], "error");
    let message = resp["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid payload: "), "message: {}", message);

    let (status, _) = send(&app, latest(DEVICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn body_parsed_without_json_content_type() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/devices/device-001/readings")
        .header("X-Device-Token", TOKEN)
        .body(Body::from(r#"{"temperature": "21.5", "humidity": 40}"#))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(body["temperature"], 21.5);
    assert_eq!(body["humidity"], 40.0);
}

#[tokio::test]
async fn devices_are_isolated() {
    let app = app();
    send(
        &app,
        submit(DEVICE, Some(TOKEN), json!({"temperature": 1.0, "humidity": 2.0}).to_string()),
    )
    .await;
    send(
        &app,
        submit(
            "device-002",
            Some("token-two"),
            json!({"temperature": 3.0, "humidity": 4.0}).to_string(),
        ),
    )
    .await;

    let (_, one) = send(&app, latest(DEVICE)).await;
    let (_, two) = send(&app, latest("device-002")).await;
    assert_eq!(one["temperature"], 1.0);
    assert_eq!(two["temperature"], 3.0);

    let (_, body) = send(&app, health()).await;
    assert_eq!(body["devices"], json!(["device-001", "device-002"]));
}

#[tokio::test]
async fn concurrent_submissions_leave_a_whole_reading() {
    let app = app();
    let mut handles = Vec::new();

    for i in 0..40 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let value = i as f64;
            let body = json!({"temperature": value, "humidity": value}).to_string();
            send(&app, submit(DEVICE, Some(TOKEN), body)).await.0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (status, body) = send(&app, latest(DEVICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["temperature"], body["humidity"]);
}

#[tokio::test]
async fn full_app_sets_request_id_and_serves_metrics() {
    let registry = DeviceRegistry::new(HashMap::from([(DEVICE.to_string(), TOKEN.to_string())]));
    let app = build_app(
        AppState::new(registry, ReadingStore::new()),
        cors_layer(None).unwrap(),
    );

    let resp = app.clone().oneshot(health()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn restricted_cors_origin() {
    let registry = DeviceRegistry::new(HashMap::new());
    let app = build_app(
        AppState::new(registry, ReadingStore::new()),
        cors_layer(Some("https://dash.example.com")).unwrap(),
    );

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://dash.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "https://dash.example.com"
    );

    assert!(cors_layer(Some("bad\norigin")).is_err());
}
