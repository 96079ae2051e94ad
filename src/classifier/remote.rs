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

//! Remote probabilistic judge.
//!
//! Formats a single prompt per call and parses a structured verdict. Every
//! failure mode (transport, status, malformed body) degrades to
//! `RiskAssessment::unavailable()` - fail-open by design of the pipeline:
//! the deterministic phases still run.

use crate::classifier::RiskClassifier;
use crate::engine_core::models::{CallContext, RiskAssessment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Serialize)]
struct JudgeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    risk: f64,
    confidence: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    tags: BTreeSet<String>,
}

pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>, model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model,
            api_key,
        }
    }

    fn build_prompt(tool: &str, args: &serde_json::Value, context: &CallContext) -> String {
        let args_json = serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string());
        format!(
            "Assess the risk of this tool invocation.\n\
             tool: {tool}\n\
             arguments: {args_json}\n\
             caller role: {role}\n\
             caller source: {source}\n\
             ticket: {ticket}\n\
             session previously ingested hostile content: {tainted}\n\
             Respond with JSON: {{\"risk\": 0..1, \"confidence\": 0..1, \"reason\": str, \"tags\": [str]}}",
            role = context.user_role.as_deref().unwrap_or("unknown"),
            source = context.source.as_deref().unwrap_or("unknown"),
            ticket = context.ticket.as_deref().unwrap_or("none"),
            tainted = context.is_tainted,
        )
    }
}

#[async_trait]
impl RiskClassifier for RemoteClassifier {
    async fn classify(
        &self,
        tool: &str,
        args: &serde_json::Value,
        context: &CallContext,
    ) -> RiskAssessment {
        let body = JudgeRequest {
            model: self.model.as_deref(),
            prompt: Self::build_prompt(tool, args, context),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("classifier transport error: {e}");
                return RiskAssessment::unavailable();
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "classifier returned non-success");
            return RiskAssessment::unavailable();
        }

        match response.json::<JudgeVerdict>().await {
            Ok(verdict) => RiskAssessment::new(verdict.risk, verdict.confidence, verdict.reason)
                .with_tags(verdict.tags),
            Err(e) => {
                warn!("classifier returned malformed verdict: {e}");
                RiskAssessment::unavailable()
            }
        }
    }
}
