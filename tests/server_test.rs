//! The kernel served over real HTTP connections.

mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use stick_kernel::config::{parse_config, StickConfig};
use stick_kernel::dispatch::{Handler, Reply};
use stick_kernel::lifecycle::build_kernel;

use common::{client, start_server};

const CONFIG: &str = r#"
    [kernel]
    package = "Stick"

    [[routes]]
    route = "GET hello /hello/@name"
    body = "Hello @name"
    content_type = "text/plain"

    [[routes]]
    route = "GET|POST /status"
    json = { ok = true }

    [[redirects]]
    route = "GET /hi"
    target = "hello(name=you)"
"#;

async fn serve(config: StickConfig) -> common::TestServer {
    let kernel = build_kernel(&config).unwrap();
    start_server(config, kernel).await
}

#[tokio::test]
async fn test_serves_config_routes() {
    let server = serve(parse_config(CONFIG).unwrap()).await;
    let client = client();

    let res = client.get(server.url("/hello/bob")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.headers()["x-powered-by"], "Stick");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Hello bob");

    let res = client.post(server.url("/status")).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), r#"{"ok":true}"#);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_and_errors() {
    let server = serve(parse_config(CONFIG).unwrap()).await;
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let res = client.get(server.url("/hi")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers()["location"].to_str().unwrap().to_string();
    assert_eq!(location, server.url("/hello/you"));

    let res = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("HTTP 404 (GET /missing)"));

    let res = client.delete(server.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = client
        .get(server.url("/missing"))
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["status"], "Not Found");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_head_has_no_body() {
    let server = serve(parse_config(CONFIG).unwrap()).await;

    let res = client().head(server.url("/hello/bob")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.unwrap().is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_throttled_response_streams() {
    let config = StickConfig::default();
    let mut kernel = build_kernel(&config).unwrap();
    kernel
        .route_with(
            "GET /big",
            Handler::from_fn(|_, _| Ok(Reply::Text("x".repeat(4 * 1024)))),
            0,
            8,
        )
        .unwrap();
    let server = start_server(config, kernel).await;

    let started = Instant::now();
    let res = client().get(server.url("/big")).send().await.unwrap();
    let bytes = res.bytes().await.unwrap();
    assert_eq!(bytes.len(), 4 * 1024);
    assert!(started.elapsed() >= Duration::from_millis(400));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_config_update_swaps_kernel() {
    let server = serve(parse_config(CONFIG).unwrap()).await;
    let client = client();

    let res = client.get(server.url("/fresh")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let updated = parse_config(
        r#"
        [[routes]]
        route = "GET /fresh"
        body = "reloaded"
        "#,
    )
    .unwrap();
    server.config_updates.send(updated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client.get(server.url("/fresh")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "reloaded");

    let res = client.get(server.url("/hello/bob")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let server = serve(StickConfig::default()).await;
    server.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = client().get(server.url("/")).send().await;
    assert!(result.is_err());
}
