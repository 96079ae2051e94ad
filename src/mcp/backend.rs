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

//! Backend forwarding seam.
//!
//! The gateway reaches its tool-execution backend through this trait. The
//! HTTP forwarder talks to a remote execution environment; the in-process
//! variant wraps one directly, which is what the demo scenario and the test
//! suites use.

use crate::engine_core::errors::GatewayError;
use crate::engine_core::models::{JsonRpcRequest, JsonRpcResponse};
use crate::exec::ExecutionEnvironment;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn forward(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, GatewayError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn forward(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::BackendTimeout
                } else {
                    GatewayError::Backend(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Backend(format!(
                "backend returned {}",
                response.status()
            )));
        }

        response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| GatewayError::Backend(format!("malformed backend response: {e}")))
    }
}

pub struct InProcessBackend {
    environment: Arc<ExecutionEnvironment>,
}

impl InProcessBackend {
    pub fn new(environment: Arc<ExecutionEnvironment>) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl Backend for InProcessBackend {
    async fn forward(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, GatewayError> {
        Ok(self.environment.execute(request).await)
    }
}
