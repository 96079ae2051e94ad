// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP transport binding.
//!
//! `POST /mcp`: one request object in, one response object out. Concurrency
//! comes from the runtime; ordering across concurrent requests is not
//! preserved (within-session ordering is still enforced by the session
//! lock).

use crate::mcp::gateway::Gateway;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn handle_post(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> Response {
    match gateway.handle_value(body).await {
        Some(response) => Json(response).into_response(),
        // Notifications get no response body.
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn run_http(gateway: Arc<Gateway>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "http transport ready");

    axum::serve(listener, router(gateway).into_make_service())
        .await
        .context("http server failed")
}
