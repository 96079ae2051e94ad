//! HTTP binding: POST /mcp serves one request object per call and keeps
//! the gateway semantics (inspection, parse errors) intact.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chimera::mcp::http::router;
use common::Harness;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post_mcp(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn tool_call_round_trips_over_http() {
    let harness = Harness::new(Harness::default_manifest(), vec![]);
    let app = router(harness.gateway.clone());

    let (status, body) = post_mcp(
        app,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {
                "name": "query_db",
                "arguments": { "query": "routine report" },
                "context": { "session_id": "sess-http", "user_role": "analyst" }
            },
            "id": 7
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jsonrpc"], json!("2.0"));
    assert_eq!(body["id"], json!(7));
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("routine report"));
}

#[tokio::test]
async fn non_request_frame_is_a_parse_error() {
    let harness = Harness::new(Harness::default_manifest(), vec![]);
    let app = router(harness.gateway.clone());

    let (status, body) = post_mcp(app, json!(["not", "a", "request"])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], json!(-32700));
    assert_eq!(body["id"], json!(null));
}

#[tokio::test]
async fn concurrent_requests_are_all_served() {
    let harness = Harness::new(Harness::default_manifest(), vec![]);

    let mut joins = Vec::new();
    for i in 0..8 {
        let app = router(harness.gateway.clone());
        joins.push(tokio::spawn(async move {
            post_mcp(
                app,
                json!({
                    "jsonrpc": "2.0",
                    "method": "tools/call",
                    "params": {
                        "name": "query_db",
                        "arguments": { "query": format!("job-{i}") },
                        "context": { "session_id": format!("sess-{i}") }
                    },
                    "id": i
                }),
            )
            .await
        }));
    }

    for (i, join) in joins.into_iter().enumerate() {
        let (status, body) = join.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!(i));
        assert!(body["error"].is_null());
    }
}
