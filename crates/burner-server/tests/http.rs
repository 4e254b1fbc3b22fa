use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use burner_server::{
    router,
    secret::{Limits, SecretService},
    store::MemoryStore,
    AppState,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "admin-token";

fn app_with_token(admin_token: Option<&str>) -> Router {
    let secrets = SecretService::new(Arc::new(MemoryStore::new()), "test", Limits::default());
    router(AppState {
        secrets,
        admin_token: admin_token.map(Arc::from),
    })
}

fn app() -> Router {
    app_with_token(Some(ADMIN_TOKEN))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn create(app: &Router, body: Value) -> String {
    let (status, created) = send(app, json_request(Method::POST, "/secrets", body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["code"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn healthcheck() {
    let (status, body) = send(&app(), bare_request(Method::GET, "/healthcheck", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_read_and_burn_flow() {
    let app = app();

    let (status, created) = send(
        &app,
        json_request(
            Method::POST,
            "/secrets",
            json!({"secret": "launch codes", "passphrase": "pw", "ttl": 300}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["secret"], "launch codes");
    let code = created["code"].as_str().unwrap().to_owned();
    let expires_at = created["expires_at"].as_str().unwrap();
    assert!(expires_at.ends_with('Z'), "{expires_at}");

    let (status, meta) = send(&app, bare_request(Method::GET, &format!("/secrets/{code}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["id"], code.as_str());
    assert_eq!(meta["ttl_seconds"], 300);
    assert!(meta.get("ciphertext").is_none());
    assert!(!meta.to_string().contains("launch codes"));

    let read = || json_request(Method::POST, &format!("/secrets/{code}"), json!({"passphrase": "pw"}));

    let (status, body) = send(&app, read()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "launch codes"}));

    let (status, body) = send(&app, read()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"code": 404, "error": "Secret doesn't exist or was already read"})
    );

    let (status, _) = send(&app, bare_request(Method::GET, &format!("/secrets/{code}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failures_look_identical() {
    let app = app();
    let code = create(&app, json!({"secret": "s", "passphrase": "right", "ttl": 300})).await;

    let (_, wrong) = send(
        &app,
        json_request(Method::POST, &format!("/secrets/{code}"), json!({"passphrase": "wrong"})),
    )
    .await;
    let (_, missing) = send(
        &app,
        json_request(Method::POST, "/secrets/no-such-id", json!({"passphrase": "right"})),
    )
    .await;
    assert_eq!(wrong, missing);

    // The wrong attempt did not burn it.
    let (_, body) = send(
        &app,
        json_request(Method::POST, &format!("/secrets/{code}"), json!({"passphrase": "right"})),
    )
    .await;
    assert_eq!(body["message"], "s");
}

#[tokio::test]
async fn read_accepts_an_empty_body() {
    let app = app();
    let code = create(&app, json!({"secret": "no passphrase", "ttl": 300})).await;

    let (status, body) = send(&app, bare_request(Method::POST, &format!("/secrets/{code}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "no passphrase");
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let app = app();

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/secrets", json!({"secret": "", "ttl": 300})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "secret");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/secrets", json!({"secret": "x".repeat(129), "ttl": 300})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "secret");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/secrets", json!({"secret": "ok", "ttl": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "ttl");
}

#[tokio::test]
async fn every_failing_field_is_reported() {
    let (status, body) = send(
        &app(),
        json_request(Method::POST, "/secrets", json!({"secret": "", "ttl": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "secret");
    assert_eq!(body["error"], "cannot be blank");
    assert_eq!(
        body["fields"],
        json!({"secret": "cannot be blank", "ttl": "TTL must be at least 5m"})
    );
}

#[tokio::test]
async fn expiry_beyond_year_9999_is_refused() {
    let (status, body) = send(
        &app(),
        json_request(
            Method::POST,
            "/secrets",
            json!({"secret": "x", "ttl": 1_000_000_000_000_i64}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!({"ttl": "TTL is too large"}));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/secrets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/secrets/whatever")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_requires_the_admin_token() {
    let app = app();
    let code = create(&app, json!({"secret": "doomed", "ttl": 300})).await;
    let uri = format!("/secrets/{code}");

    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, Some("nope"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, meta) = send(&app, bare_request(Method::DELETE, &uri, Some(ADMIN_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["id"], code.as_str());

    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, Some(ADMIN_TOKEN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_counts_stored_secrets() {
    let app = app();
    create(&app, json!({"secret": "one", "ttl": 300})).await;
    create(&app, json!({"secret": "two", "ttl": 600})).await;

    let (status, _) = send(&app, bare_request(Method::GET, "/stats", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, bare_request(Method::GET, "/stats", Some(ADMIN_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"count": 2}));
}

#[tokio::test]
async fn admin_routes_are_locked_without_a_configured_token() {
    let app = app_with_token(None);
    let code = create(&app, json!({"secret": "keep", "ttl": 300})).await;

    let (status, _) = send(
        &app,
        bare_request(Method::DELETE, &format!("/secrets/{code}"), Some("")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Public routes still work.
    let (status, _) = send(&app, bare_request(Method::GET, &format!("/secrets/{code}"), None)).await;
    assert_eq!(status, StatusCode::OK);
}
