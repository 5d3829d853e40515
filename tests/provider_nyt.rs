//! Newswire provider against an ephemeral local HTTP server.
//!
//! Covered:
//! - api key is sent as the `api-key` query parameter
//! - `results` array becomes the snapshot items
//! - non-2xx, malformed bodies, and unreachable hosts are fetch errors
//! - the api key never appears in an error message

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use news_galore::ingest::providers::NytNewswire;
use news_galore::ingest::types::FeedSource;

const KEY: &str = "test-key-123";

async fn ok_handler(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    if q.get("api-key").map(String::as_str) != Some(KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "fault": "bad key" }))).into_response();
    }
    Json(json!({
        "status": "OK",
        "num_results": 2,
        "results": [
            { "title": "a", "des_facet": ["Politics"] },
            { "title": "b", "des_facet": "" }
        ]
    }))
    .into_response()
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/ok", get(ok_handler))
        .route(
            "/boom",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route("/garbage", get(|| async { "<html>not json</html>" }))
        .route(
            "/wrong-shape",
            get(|| async { Json(json!({ "results": "nope" })) }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "results": [] }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn provider(addr: SocketAddr, path: &str, timeout: Duration) -> NytNewswire {
    NytNewswire::new(format!("http://{addr}{path}"), KEY, timeout).expect("build provider")
}

#[tokio::test]
async fn fetch_returns_results_array() {
    let addr = spawn_upstream().await;
    let snap = provider(addr, "/ok", Duration::from_secs(5))
        .fetch()
        .await
        .expect("fetch ok");

    assert_eq!(snap.len(), 2);
    assert_eq!(snap.items[0].descriptive_tags(), vec!["Politics"]);
    assert!(snap.items[1].descriptive_tags().is_empty());
}

#[tokio::test]
async fn wrong_key_is_rejected_as_fetch_error() {
    let addr = spawn_upstream().await;
    let p = NytNewswire::new(format!("http://{addr}/ok"), "other", Duration::from_secs(5))
        .expect("build provider");
    let err = p.fetch().await.expect_err("401 must fail");
    assert!(err.message.contains("401"), "got: {}", err.message);
}

#[tokio::test]
async fn server_error_is_fetch_error() {
    let addr = spawn_upstream().await;
    let err = provider(addr, "/boom", Duration::from_secs(5))
        .fetch()
        .await
        .expect_err("500 must fail");
    assert!(err.message.contains("500"), "got: {}", err.message);
}

#[tokio::test]
async fn malformed_bodies_are_fetch_errors() {
    let addr = spawn_upstream().await;
    for path in ["/garbage", "/wrong-shape"] {
        let err = provider(addr, path, Duration::from_secs(5))
            .fetch()
            .await
            .expect_err("malformed body must fail");
        assert!(err.message.contains("malformed"), "{path}: {}", err.message);
    }
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let addr = spawn_upstream().await;
    let err = provider(addr, "/slow", Duration::from_millis(200))
        .fetch()
        .await
        .expect_err("must time out");
    assert!(err.message.contains("timed out"), "got: {}", err.message);
}

#[tokio::test]
async fn unreachable_host_does_not_leak_key() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = provider(addr, "/ok", Duration::from_secs(2))
        .fetch()
        .await
        .expect_err("nothing listening");
    assert!(!err.message.contains(KEY), "api key leaked: {}", err.message);
}
