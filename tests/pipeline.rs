//! End-to-end behaviour of the request pipeline over a real socket.

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

mod common;

const ORIGIN: &str = "http://localhost:5173";

#[tokio::test]
async fn test_unmatched_api_path_is_json_404() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::get(app.url("/api/nonexistent")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"status": "fail", "message": "Can't find /api/nonexistent on this server"})
    );
}

#[tokio::test]
async fn test_hello_router() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::get(app.url("/api/hello")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_unhandled_method_on_mounted_router_is_json_404() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::Client::new()
        .delete(app.url("/api/hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"status": "fail", "message": "Can't find /api/hello on this server"})
    );
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::Client::new()
        .get(app.url("/api/hello"))
        .header("x-request-id", "trace-me-42")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["x-request-id"], "trace-me-42");
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::Client::new()
        .request(Method::OPTIONS, app.url("/api/users/login"))
        .header("origin", ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(res.headers()["access-control-allow-origin"], ORIGIN);
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    assert!(res.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("PATCH"));
}

#[tokio::test]
async fn test_disallowed_origin_gets_no_cors_headers() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::Client::new()
        .get(app.url("/api/hello"))
        .header("origin", "https://elsewhere.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_isolation_headers_on_every_response() {
    let mut config = common::test_config();
    config.rate_limit.max_requests = 1;
    let app = common::spawn_app(config).await;
    let client = reqwest::Client::new();

    let ok = client.get(app.url("/api/hello")).send().await.unwrap();
    let limited = client.get(app.url("/api/hello")).send().await.unwrap();
    let missing = client.get(app.url("/nowhere")).send().await.unwrap();
    let preflight = client
        .request(Method::OPTIONS, app.url("/api/hello"))
        .header("origin", ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);

    for res in [&ok, &limited, &missing, &preflight] {
        let headers = res.headers();
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert_eq!(headers["cross-origin-opener-policy"], "cross-origin");
        assert_eq!(headers["cross-origin-embedder-policy"], "require-corp");
        assert_eq!(headers["x-content-type-options"], "nosniff");
    }
}

#[tokio::test]
async fn test_rate_limit_rejects_with_fixed_message() {
    let mut config = common::test_config();
    config.rate_limit.max_requests = 3;
    let app = common::spawn_app(config).await;
    let client = reqwest::Client::new();

    for remaining in ["2", "1", "0"] {
        let res = client.get(app.url("/api/hello")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-remaining"], remaining);
    }

    let res = client.get(app.url("/api/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "fail",
            "message": "Too many requests from this IP, please try again in an hour!"
        })
    );

    // Outside the scope nothing is counted.
    let res = client.get(app.url("/favicon.ico")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_oversize_json_body_is_413() {
    let app = common::spawn_app(common::test_config()).await;
    let bio = "x".repeat(11 * 1024);

    let res = reqwest::Client::new()
        .post(app.url("/api/hello"))
        .json(&json!({ "bio": bio }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Request body exceeds the 10kb limit");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = common::spawn_app(common::test_config()).await;

    let res = reqwest::Client::new()
        .post(app.url("/api/hello"))
        .header("content-type", "application/json")
        .body(r#"{"name": "#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_operator_keys_never_reach_routers() {
    let backend = common::start_echo_backend().await;
    let app = common::spawn_app(common::config_with_upstream("/api/users", backend)).await;

    let res = reqwest::Client::new()
        .post(app.url("/api/users/login?role%5B%24ne%5D=admin&remember=1"))
        .json(&json!({"email": {"$gt": ""}, "password": "secret", "$where": "1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["query"], "remember=1");
    let forwarded: Value = serde_json::from_str(seen["body"].as_str().unwrap()).unwrap();
    assert_eq!(forwarded, json!({"email": {}, "password": "secret"}));
}

#[tokio::test]
async fn test_static_files_served_outside_api() {
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("robots.txt"), "User-agent: *").unwrap();

    let mut config = common::test_config();
    config.static_files.enabled = true;
    config.static_files.directory = public.path().to_string_lossy().into_owned();
    let app = common::spawn_app(config).await;

    let res = reqwest::get(app.url("/robots.txt")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["cross-origin-embedder-policy"],
        "require-corp"
    );
    assert_eq!(res.text().await.unwrap(), "User-agent: *");

    let res = reqwest::get(app.url("/missing.js")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Can't find /missing.js on this server");
}
