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

//! Domain models for the chimera gateway.
//!
//! This module contains pure data structures representing routes, risk
//! assessments, call context, and the JSON-RPC frames. It is designed to be
//! free of I/O side effects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Newtype wrapper around the opaque session identifier supplied by the
/// agent, or minted on first contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identifier for a first-contact message that carries none.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The two data planes a call can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Production,
    Shadow,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Production => "production",
            Route::Shadow => "shadow",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one policy evaluation. Immutable snapshot; all side effects
/// (risk recording, ledger append) belong to the interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: Route,
    pub reason: String,
    /// Identifier of the rule or table entry that fired, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Name of the phase that produced the action ("default" when none did).
    pub phase: String,
}

/// Immutable record emitted by the risk classifier per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk: f64,
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl RiskAssessment {
    pub fn new(risk: f64, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            risk: risk.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Fail-open substitute when the classifier misses its budget or
    /// returns garbage. The deterministic policy phases still run.
    pub fn unavailable() -> Self {
        Self {
            risk: 0.0,
            confidence: 0.0,
            reason: "unavailable".to_string(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }
}

/// Process-level context defaults, merged below the agent envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextDefaults {
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub source: Option<String>,
}

/// Per-call context, built from three sources merged in order (later wins):
/// process defaults, the agent-provided envelope, and fields derived by the
/// interceptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    // Derived by the interceptor, never taken from the envelope.
    #[serde(default)]
    pub is_tainted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taint_source: Option<String>,
    #[serde(default)]
    pub is_suspicious_query: bool,
    #[serde(default)]
    pub accumulated_risk: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_category: Option<String>,

    /// Scenario-specific keys reachable via dotted context paths.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallContext {
    /// Merge process defaults with the agent envelope; envelope wins.
    pub fn from_envelope(defaults: &ContextDefaults, envelope: Option<&serde_json::Value>) -> Self {
        let mut ctx = CallContext {
            user_id: defaults.user_id.clone(),
            user_role: defaults.user_role.clone(),
            source: defaults.source.clone(),
            ..CallContext::default()
        };

        if let Some(serde_json::Value::Object(map)) = envelope {
            for (key, value) in map {
                match (key.as_str(), value.as_str()) {
                    ("user_id", Some(s)) => ctx.user_id = Some(s.to_string()),
                    ("user_role", Some(s)) => ctx.user_role = Some(s.to_string()),
                    ("source", Some(s)) => ctx.source = Some(s.to_string()),
                    ("ticket", Some(s)) => ctx.ticket = Some(s.to_string()),
                    ("session_id", Some(s)) => ctx.session_id = Some(s.to_string()),
                    _ => {
                        ctx.extra.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        ctx
    }

    /// Snapshot for the match evaluator's dotted-path lookups.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One inspected tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: serde_json::Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}
