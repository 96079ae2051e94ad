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

//! Per-call orchestration.
//!
//! The pipeline is straight-line by design: taint check, classify (with
//! deadline), accumulate, derive flags, evaluate, issue warrant, log,
//! forward, sanitize. The session handle is held locked from the taint
//! check through the ledger append, so a session's calls are linearized;
//! the forward itself happens after the lock is released. Routing is never
//! reported to the agent - every reply is a plausible success from one
//! plane or a generic JSON-RPC error.

use crate::authority::CredentialAuthority;
use crate::classifier::RiskClassifier;
use crate::engine::evaluator::PolicyEvaluator;
use crate::engine::manifest::PolicyManifest;
use crate::engine_core::constants::{jsonrpc, timeouts, warrant as warrant_consts};
use crate::engine_core::ledger::{EventType, Ledger, LedgerDraft};
use crate::engine_core::models::{
    CallContext, ContextDefaults, JsonRpcRequest, JsonRpcResponse, RiskAssessment, RouteDecision,
    SessionId,
};
use crate::engine_core::sanitizer::ResponseSanitizer;
use crate::engine_core::session::SessionStore;
use crate::mcp::backend::Backend;
use crate::utils::time;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Interceptor {
    manifest: Arc<PolicyManifest>,
    sessions: Arc<SessionStore>,
    classifier: Arc<dyn RiskClassifier>,
    authority: Arc<CredentialAuthority>,
    ledger: Arc<Ledger>,
    sanitizer: Arc<ResponseSanitizer>,
    backend: Arc<dyn Backend>,
    defaults: ContextDefaults,
    classifier_budget: Duration,
    backend_deadline: Duration,
}

impl Interceptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifest: Arc<PolicyManifest>,
        sessions: Arc<SessionStore>,
        classifier: Arc<dyn RiskClassifier>,
        authority: Arc<CredentialAuthority>,
        ledger: Arc<Ledger>,
        sanitizer: Arc<ResponseSanitizer>,
        backend: Arc<dyn Backend>,
        defaults: ContextDefaults,
    ) -> Self {
        Self {
            manifest,
            sessions,
            classifier,
            authority,
            ledger,
            sanitizer,
            backend,
            defaults,
            classifier_budget: Duration::from_millis(timeouts::CLASSIFIER_BUDGET_MS),
            backend_deadline: Duration::from_secs(timeouts::BACKEND_DEADLINE_SECS),
        }
    }

    pub fn with_deadlines(mut self, classifier_budget: Duration, backend_deadline: Duration) -> Self {
        self.classifier_budget = classifier_budget;
        self.backend_deadline = backend_deadline;
        self
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    /// Handle one inspected tools/call from extraction through sanitized
    /// response.
    pub async fn process(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        let Some(params) = request.params.clone() else {
            return JsonRpcResponse::failure(id, jsonrpc::ERROR_INVALID_REQUEST, "missing params");
        };
        let Some(tool) = params.get("name").and_then(Value::as_str).map(str::to_string) else {
            return JsonRpcResponse::failure(id, jsonrpc::ERROR_INVALID_REQUEST, "missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        if !arguments.is_object() {
            return JsonRpcResponse::failure(
                id,
                jsonrpc::ERROR_INVALID_REQUEST,
                "arguments must be an object",
            );
        }

        let mut context = CallContext::from_envelope(&self.defaults, params.get("context"));
        let session_id = context
            .session_id
            .clone()
            .map(SessionId::new)
            .unwrap_or_else(SessionId::mint);
        context.session_id = Some(session_id.to_string());

        let now = time::now();
        let window = self.sessions.window_secs();
        let handle = self.sessions.touch(&session_id, now).await;
        let mut session = handle.lock().await;

        // Taint check: label only, never short-circuits routing.
        let mut taint_flipped = None;
        if self.manifest.taint.file_tools.iter().any(|t| t == &tool) {
            if let Some(path) = self.path_argument(&arguments) {
                let lower = path.to_lowercase();
                let red = self
                    .manifest
                    .taint
                    .red_patterns
                    .iter()
                    .any(|p| lower.contains(&p.to_lowercase()));
                let green = self
                    .manifest
                    .taint
                    .green_patterns
                    .iter()
                    .any(|p| lower.contains(&p.to_lowercase()));
                if red && !green && !session.is_tainted() {
                    session.mark_tainted(&path);
                    taint_flipped = Some(path);
                }
            }
        }

        // Classify within budget; over budget degrades to unavailable.
        let assessment = match tokio::time::timeout(
            self.classifier_budget,
            self.classifier.classify(&tool, &arguments, &context),
        )
        .await
        {
            Ok(assessment) => assessment,
            Err(_) => {
                warn!(%tool, "classifier missed its budget; treating as unavailable");
                RiskAssessment::unavailable()
            }
        };

        session.record_risk(assessment.risk, &tool, now, window);
        let accumulated = session.accumulated_risk(now, window);

        context.is_tainted = session.is_tainted();
        context.taint_source = session.taint_source().map(str::to_string);
        context.is_suspicious_query =
            contains_keyword(&arguments, &self.manifest.suspicious_keywords);
        context.accumulated_risk = accumulated;
        context.tool_category = self.manifest.tool_categories.get(&tool).cloned();

        let decision = self.evaluate(&tool, &arguments, &context, &assessment, accumulated, &session_id);

        info!(
            session = %session_id,
            %tool,
            route = %decision.route,
            phase = %decision.phase,
            risk = assessment.risk,
            accumulated,
            "routing decision"
        );

        let warrant = match self
            .authority
            .issue(&session_id, &tool, decision.route)
        {
            Ok(w) => w,
            Err(e) => {
                warn!("warrant issuance failed: {e}");
                return JsonRpcResponse::failure(id, jsonrpc::ERROR_INTERNAL, "internal error");
            }
        };

        if let Some(source) = &taint_flipped {
            self.append_quiet(LedgerDraft {
                session_id: session_id.to_string(),
                event_type: EventType::TaintMarked,
                trigger: source.clone(),
                action: "mark_tainted".to_string(),
                outcome: "ok".to_string(),
                accumulated_risk: accumulated,
            });
        }
        self.append_quiet(LedgerDraft {
            session_id: session_id.to_string(),
            event_type: EventType::ToolCall,
            trigger: format!(
                "{tool}:{}",
                decision.rule_id.as_deref().unwrap_or(&decision.phase)
            ),
            action: decision.route.as_str().to_string(),
            outcome: "ok".to_string(),
            accumulated_risk: accumulated,
        });

        // State for this call is committed; the next call on this session
        // may begin while the backend round-trip is in flight.
        drop(session);

        let forwarded = self.build_forward(&request, &params, &arguments, &warrant);
        match tokio::time::timeout(self.backend_deadline, self.backend.forward(&forwarded)).await {
            Ok(Ok(mut response)) => {
                if let Some(result) = response.result.as_mut() {
                    strip_key(result, warrant_consts::RESERVED_PARAM);
                    self.sanitizer.sanitize_value(result);
                }
                response.id = id;
                response
            }
            Ok(Err(e)) => {
                warn!("backend error: {e}");
                self.append_quiet(LedgerDraft {
                    session_id: session_id.to_string(),
                    event_type: EventType::ToolCall,
                    trigger: tool.clone(),
                    action: decision.route.as_str().to_string(),
                    outcome: "error".to_string(),
                    accumulated_risk: accumulated,
                });
                JsonRpcResponse::failure(id, jsonrpc::ERROR_BACKEND, "tool execution failed")
            }
            Err(_) => {
                warn!(%tool, "backend deadline exceeded");
                self.append_quiet(LedgerDraft {
                    session_id: session_id.to_string(),
                    event_type: EventType::ToolCall,
                    trigger: tool.clone(),
                    action: decision.route.as_str().to_string(),
                    outcome: "timeout".to_string(),
                    accumulated_risk: accumulated,
                });
                JsonRpcResponse::failure(id, jsonrpc::ERROR_BACKEND, "tool execution failed")
            }
        }
    }

    /// An unexpected evaluator failure falls through to the manifest's
    /// default action and leaves a POLICY_FALLBACK mark in the ledger.
    fn evaluate(
        &self,
        tool: &str,
        arguments: &Value,
        context: &CallContext,
        assessment: &RiskAssessment,
        accumulated: f64,
        session_id: &SessionId,
    ) -> RouteDecision {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            PolicyEvaluator::evaluate(
                &self.manifest,
                tool,
                arguments,
                context,
                assessment,
                accumulated,
            )
        }));

        match result {
            Ok(decision) => decision,
            Err(_) => {
                warn!(tool, "policy evaluator failed; using default action");
                self.append_quiet(LedgerDraft {
                    session_id: session_id.to_string(),
                    event_type: EventType::PolicyFallback,
                    trigger: tool.to_string(),
                    action: self.manifest.default_action.as_str().to_string(),
                    outcome: "ok".to_string(),
                    accumulated_risk: accumulated,
                });
                RouteDecision {
                    route: self.manifest.default_action,
                    reason: "evaluator failure".to_string(),
                    rule_id: None,
                    phase: "fallback".to_string(),
                }
            }
        }
    }

    fn path_argument(&self, arguments: &Value) -> Option<String> {
        self.manifest
            .taint
            .path_fields
            .iter()
            .find_map(|f| arguments.get(f).and_then(Value::as_str))
            .map(str::to_string)
    }

    fn build_forward(
        &self,
        request: &JsonRpcRequest,
        params: &Value,
        arguments: &Value,
        warrant: &str,
    ) -> JsonRpcRequest {
        let mut forwarded_args = arguments.clone();
        if let Some(map) = forwarded_args.as_object_mut() {
            map.insert(
                warrant_consts::RESERVED_PARAM.to_string(),
                Value::String(warrant.to_string()),
            );
        }

        let mut forwarded_params = params.clone();
        if let Some(map) = forwarded_params.as_object_mut() {
            map.insert("arguments".to_string(), forwarded_args);
        }

        JsonRpcRequest {
            jsonrpc: request.jsonrpc.clone(),
            method: request.method.clone(),
            params: Some(forwarded_params),
            id: request.id.clone(),
        }
    }

    /// Ledger failures are already counted and queued inside the ledger;
    /// the call must not fail on them.
    fn append_quiet(&self, draft: LedgerDraft) {
        if let Err(e) = self.ledger.append(draft) {
            warn!("ledger append deferred: {e}");
        }
    }
}

/// Case-insensitive scan of every string leaf in the arguments.
fn contains_keyword(value: &Value, keywords: &[String]) -> bool {
    match value {
        Value::String(s) => {
            let lower = s.to_lowercase();
            keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
        }
        Value::Array(items) => items.iter().any(|i| contains_keyword(i, keywords)),
        Value::Object(map) => map.values().any(|v| contains_keyword(v, keywords)),
        _ => false,
    }
}

/// Remove `key` from every object in the tree (warrant echo scrub).
fn strip_key(value: &mut Value, key: &str) {
    match value {
        Value::Object(map) => {
            map.remove(key);
            for (_, v) in map.iter_mut() {
                strip_key(v, key);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_key(item, key);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyword_scan_reaches_nested_strings() {
        let keywords = vec!["formula".to_string()];
        let args = json!({
            "query": {"filters": ["status:active", "name contains FORMULA"]}
        });
        assert!(contains_keyword(&args, &keywords));
        assert!(!contains_keyword(&json!({"q": "benign"}), &keywords));
    }

    #[test]
    fn strip_key_removes_warrant_echoes_everywhere() {
        let mut value = json!({
            "__chimera_warrant__": "abc",
            "nested": {"__chimera_warrant__": "def", "keep": 1},
            "list": [{"__chimera_warrant__": "ghi"}]
        });
        strip_key(&mut value, "__chimera_warrant__");
        assert_eq!(
            value,
            json!({"nested": {"keep": 1}, "list": [{}]})
        );
    }
}
