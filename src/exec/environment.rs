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

//! Warrant-gated tool execution.
//!
//! Each plane's verifier holds exactly one public key; the presented
//! warrant selects the data store, not any field the caller controls.
//! Verification failures are uniform: the error never reveals which key
//! was tried or that a second plane exists. Shadow responses carry uniform
//! random timing jitter so latency cannot distinguish planes.

use crate::authority::warrant::WarrantVerifier;
use crate::engine_core::constants::{jitter, jsonrpc, warrant as warrant_consts};
use crate::engine_core::models::{JsonRpcRequest, JsonRpcResponse, Route};
use crate::exec::scenario::{ScenarioConfig, ToolBinding};
use crate::exec::store::{DataStore, ProductionStore, ShadowStore};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ExecutionEnvironment {
    scenario: Arc<ScenarioConfig>,
    production: ProductionStore,
    shadow: ShadowStore,
    production_verifier: WarrantVerifier,
    shadow_verifier: WarrantVerifier,
    jitter_ms: (u64, u64),
}

impl ExecutionEnvironment {
    pub fn new(
        scenario: Arc<ScenarioConfig>,
        production_verifier: WarrantVerifier,
        shadow_verifier: WarrantVerifier,
    ) -> Self {
        Self {
            production: ProductionStore::from_scenario(&scenario),
            shadow: ShadowStore::from_scenario(&scenario),
            scenario,
            production_verifier,
            shadow_verifier,
            jitter_ms: (jitter::MIN_MS, jitter::MAX_MS),
        }
    }

    pub fn with_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_ms = (min_ms, max_ms);
        self
    }

    /// Execute one forwarded tools/call. The response schema is identical
    /// for both planes; only values differ.
    pub async fn execute(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        let Some(params) = &request.params else {
            return JsonRpcResponse::failure(id, jsonrpc::ERROR_INVALID_REQUEST, "missing params");
        };
        let Some(tool) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::failure(id, jsonrpc::ERROR_INVALID_REQUEST, "missing tool name");
        };
        let mut arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let warrant = arguments
            .as_object_mut()
            .and_then(|map| map.remove(warrant_consts::RESERVED_PARAM))
            .and_then(|v| v.as_str().map(str::to_string));

        let Some(warrant) = warrant else {
            warn!(tool, "tools/call arrived without a warrant");
            return JsonRpcResponse::failure(id, jsonrpc::ERROR_AUTH, "unauthorized");
        };

        let route = match self.verify(&warrant, tool) {
            Some(route) => route,
            None => {
                warn!(tool, "warrant verification failed");
                return JsonRpcResponse::failure(id, jsonrpc::ERROR_AUTH, "unauthorized");
            }
        };

        let store: &dyn DataStore = match route {
            Route::Production => &self.production,
            Route::Shadow => &self.shadow,
        };
        let response = self.run_tool(store, tool, &arguments, id).await;

        if route == Route::Shadow {
            let (min, max) = self.jitter_ms;
            let delay = rand::rng().random_range(min..=max);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        response
    }

    /// Exactly one of the two verifiers can accept a well-formed warrant;
    /// both rejecting means the warrant is bad. Rejection reasons are
    /// deliberately not distinguished.
    fn verify(&self, warrant: &str, tool: &str) -> Option<Route> {
        let claims = if let Ok(claims) = self.production_verifier.verify(warrant) {
            Some((Route::Production, claims))
        } else if let Ok(claims) = self.shadow_verifier.verify(warrant) {
            Some((Route::Shadow, claims))
        } else {
            None
        };

        let (route, claims) = claims?;
        // The warrant is bound to one tool; a replay against another tool
        // is a verification failure.
        if claims.tool != tool {
            return None;
        }
        debug!(%route, tool, "warrant accepted");
        Some(route)
    }

    async fn run_tool(
        &self,
        store: &dyn DataStore,
        tool: &str,
        arguments: &Value,
        id: Value,
    ) -> JsonRpcResponse {
        let Some(binding) = self.scenario.tools.get(tool) else {
            return JsonRpcResponse::failure(
                id,
                jsonrpc::ERROR_METHOD_NOT_FOUND,
                format!("unknown tool: {tool}"),
            );
        };

        let outcome = match binding {
            ToolBinding::FileRead { path_field } => {
                let Some(path) = arguments.get(path_field).and_then(Value::as_str) else {
                    return JsonRpcResponse::failure(
                        id,
                        jsonrpc::ERROR_INVALID_REQUEST,
                        format!("missing argument: {path_field}"),
                    );
                };
                match store.read_file(path).await {
                    Ok(Some(content)) => Ok(content),
                    Ok(None) => Err(format!("file not found: {path}")),
                    Err(e) => {
                        warn!("file read failed: {e}");
                        return JsonRpcResponse::failure(
                            id,
                            jsonrpc::ERROR_BACKEND,
                            "tool execution failed",
                        );
                    }
                }
            }
            ToolBinding::RecordLookup {
                collection,
                id_field,
            } => {
                let Some(record_id) = arguments.get(id_field) else {
                    return JsonRpcResponse::failure(
                        id,
                        jsonrpc::ERROR_INVALID_REQUEST,
                        format!("missing argument: {id_field}"),
                    );
                };
                match store.lookup(collection, record_id).await {
                    Ok(Some(record)) => Ok(record.to_string()),
                    Ok(None) => Err(format!("record not found: {}", record_id)),
                    Err(e) => {
                        warn!("record lookup failed: {e}");
                        return JsonRpcResponse::failure(
                            id,
                            jsonrpc::ERROR_BACKEND,
                            "tool execution failed",
                        );
                    }
                }
            }
            ToolBinding::Echo => Ok(arguments.to_string()),
        };

        let (text, is_error) = match outcome {
            Ok(text) => (text, false),
            Err(text) => (text, true),
        };

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error,
            }),
        )
    }
}
