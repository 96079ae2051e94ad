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

//! Transport reader/writer tasks.
//!
//! Reads are decoupled from handling through an mpsc channel so a slow
//! backend round-trip never blocks the stdin reader; writes go through
//! their own buffered task.

use crate::engine_core::models::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::codec::LineCodec;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::error;

/// Messages arriving from the downstream client (the agent).
#[derive(Debug)]
pub enum DownstreamEvent {
    Request(JsonRpcRequest),
    /// Malformed JSON or framing error
    Error(String),
    /// Client disconnected (EOF) or explicit shutdown
    Disconnect,
}

/// Spawns a background task reading agent frames.
pub fn spawn_downstream_reader<R>(stream: R, tx: mpsc::Sender<DownstreamEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut framed = FramedRead::new(stream, LineCodec::new());

        while let Some(result) = framed.next().await {
            match result {
                Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                    Ok(request) => {
                        if tx.send(DownstreamEvent::Request(request)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("JSON-RPC request parse error: {e}");
                        let _ = tx.send(DownstreamEvent::Error(e.to_string())).await;
                    }
                },
                Err(e) => {
                    error!("framing error: {e}");
                    let _ = tx.send(DownstreamEvent::Error(e.to_string())).await;
                }
            }
        }
        let _ = tx.send(DownstreamEvent::Disconnect).await;
    });
}

/// Spawns a background task draining responses to the writer.
pub fn spawn_response_writer<W>(mut writer: W) -> mpsc::Sender<JsonRpcResponse>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);
    tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!("response serialization failed: {e}");
                    continue;
                }
            };
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });
    tx
}
