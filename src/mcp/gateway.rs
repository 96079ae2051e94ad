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

//! Method dispatch.
//!
//! Only `tools/call` is inspected; everything else (`initialize`,
//! `tools/list`, notifications) forwards unchanged. Parse failures surface
//! as JSON-RPC -32700.

use crate::engine_core::constants::{jsonrpc, methods, timeouts};
use crate::engine_core::interceptor::Interceptor;
use crate::engine_core::models::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct Gateway {
    interceptor: Arc<Interceptor>,
}

impl Gateway {
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self { interceptor }
    }

    /// Entry point for raw frames. A frame that is not a request object is
    /// a parse error with a null id.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                Value::Null,
                jsonrpc::ERROR_PARSE,
                format!("parse error: {e}"),
            )),
        }
    }

    /// Returns `None` for notifications (requests without an id).
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.method == methods::TOOLS_CALL {
            return Some(self.interceptor.process(request).await);
        }

        // Passthrough: forward unchanged with the same deadline the
        // interceptor uses for tool calls.
        let is_notification = request.id.is_none();
        let id = request.id.clone().unwrap_or(Value::Null);
        let backend = self.interceptor.backend();

        let result = tokio::time::timeout(
            Duration::from_secs(timeouts::BACKEND_DEADLINE_SECS),
            backend.forward(&request),
        )
        .await;

        if is_notification {
            return None;
        }

        match result {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                warn!(method = %request.method, "passthrough failed: {e}");
                Some(JsonRpcResponse::failure(
                    id,
                    jsonrpc::ERROR_BACKEND,
                    "upstream error",
                ))
            }
            Err(_) => Some(JsonRpcResponse::failure(
                id,
                jsonrpc::ERROR_BACKEND,
                "upstream error",
            )),
        }
    }
}
