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

//! Stdio transport loop.
//!
//! One JSON object per line on stdin/stdout. The reader and writer run as
//! independent buffered tasks; requests are handled in the order they are
//! read, which is what gives within-session processing order on this
//! binding.

use crate::engine_core::constants::jsonrpc;
use crate::engine_core::models::JsonRpcResponse;
use crate::mcp::gateway::Gateway;
use crate::mcp::pipeline::{spawn_downstream_reader, spawn_response_writer, DownstreamEvent};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub async fn run_stdio(gateway: Arc<Gateway>) -> Result<()> {
    info!("stdio transport ready");

    let (tx, mut rx) = mpsc::channel::<DownstreamEvent>(64);
    spawn_downstream_reader(tokio::io::stdin(), tx);
    let writer = spawn_response_writer(tokio::io::stdout());

    while let Some(event) = rx.recv().await {
        match event {
            DownstreamEvent::Request(request) => {
                debug!(method = %request.method, "handling request");
                if let Some(response) = gateway.handle(request).await {
                    if writer.send(response).await.is_err() {
                        break;
                    }
                }
            }
            DownstreamEvent::Error(e) => {
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    jsonrpc::ERROR_PARSE,
                    format!("parse error: {e}"),
                );
                if writer.send(response).await.is_err() {
                    break;
                }
            }
            DownstreamEvent::Disconnect => {
                info!("agent disconnected");
                break;
            }
        }
    }

    Ok(())
}
