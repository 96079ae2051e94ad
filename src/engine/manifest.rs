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

//! Policy manifest data model.
//!
//! The manifest declares the evaluation phases, directive tables, rule
//! lists, and threshold clauses the evaluator executes, plus the gateway's
//! taint patterns, suspicious keywords, tool categories, and sanitizer
//! rules. Pure data; loading and validation live in `utils::policy_loader`.

use crate::engine_core::errors::GatewayError;
use crate::engine_core::models::Route;
use crate::engine_core::sanitizer::SanitizerRule;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Phase names the evaluator understands.
pub const PHASE_DIRECTIVES: &str = "directives";
pub const PHASE_TRUSTED_WORKFLOWS: &str = "trusted_workflows";
pub const PHASE_SECURITY_POLICIES: &str = "security_policies";
pub const PHASE_ACCUMULATED_RISK: &str = "accumulated_risk";
pub const PHASE_EVENT_RISK: &str = "event_risk";

pub const KNOWN_PHASES: [&str; 5] = [
    PHASE_DIRECTIVES,
    PHASE_TRUSTED_WORKFLOWS,
    PHASE_SECURITY_POLICIES,
    PHASE_ACCUMULATED_RISK,
    PHASE_EVENT_RISK,
];

/// Explicit human decisions first, then explicit allows, then explicit
/// blocks, then stateful risk, then single-event risk, then the default.
pub fn default_evaluation_order() -> Vec<String> {
    KNOWN_PHASES.iter().map(|s| s.to_string()).collect()
}

/// The closed operator set for match leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Regex,
    In,
    NotIn,
}

/// Leaf comparison over a dotted path into `{args, context}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLeaf {
    pub field: String,
    pub operator: MatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Resolved against the context subtree at evaluation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from_context: Option<String>,
}

/// Boolean match tree with `all`/`any`/`not` internal nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchNode {
    All(Vec<MatchNode>),
    Any(Vec<MatchNode>),
    Not(Box<MatchNode>),
    #[serde(untagged)]
    Leaf(MatchLeaf),
}

impl MatchNode {
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a MatchLeaf)) {
        match self {
            MatchNode::All(nodes) | MatchNode::Any(nodes) => {
                for node in nodes {
                    node.for_each_leaf(f);
                }
            }
            MatchNode::Not(node) => node.for_each_leaf(f),
            MatchNode::Leaf(leaf) => f(leaf),
        }
    }
}

/// A named routing directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// Optional tool whitelist; absent means any tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(rename = "match")]
    pub matcher: MatchNode,
    pub action: Route,
    pub reason: String,
    /// Authoring-intent marker: the loader rejects an allow-only rule whose
    /// action is not `production`.
    #[serde(default)]
    pub allow_only: bool,
}

/// Directive table entry (user/role -> action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub action: Route,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directives {
    #[serde(default)]
    pub users: HashMap<String, Directive>,
    #[serde(default)]
    pub roles: HashMap<String, Directive>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdField {
    AccumulatedRisk,
    EventRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOp {
    Gte,
    Gt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdClause {
    pub field: ThresholdField,
    pub operator: ThresholdOp,
    pub threshold: f64,
    pub action: Route,
    pub reason: String,
    /// When present, the clause only fires if classifier confidence is at
    /// least this floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_floor: Option<f64>,
}

/// Red/green path patterns for the taint check; matched case-insensitively
/// as substrings of the file-path argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintConfig {
    #[serde(default)]
    pub file_tools: Vec<String>,
    #[serde(default = "TaintConfig::default_path_fields")]
    pub path_fields: Vec<String>,
    #[serde(default)]
    pub red_patterns: Vec<String>,
    #[serde(default)]
    pub green_patterns: Vec<String>,
}

impl TaintConfig {
    fn default_path_fields() -> Vec<String> {
        vec!["filename".to_string(), "path".to_string()]
    }
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            file_tools: Vec::new(),
            path_fields: Self::default_path_fields(),
            red_patterns: Vec::new(),
            green_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyManifest {
    #[serde(default = "default_evaluation_order")]
    pub evaluation_order: Vec<String>,
    pub default_action: Route,

    #[serde(default)]
    pub directives: Directives,
    #[serde(default)]
    pub trusted_workflows: Vec<Rule>,
    #[serde(default)]
    pub security_policies: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accumulated_risk: Option<ThresholdClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_risk: Option<ThresholdClause>,

    #[serde(default)]
    pub taint: TaintConfig,
    #[serde(default)]
    pub suspicious_keywords: Vec<String>,
    #[serde(default)]
    pub tool_categories: HashMap<String, String>,
    #[serde(default)]
    pub sanitizer: Vec<SanitizerRule>,

    /// Regexes from `regex` match leaves, compiled once after load.
    #[serde(skip)]
    pub compiled_regexes: HashMap<String, Regex>,
}

impl PolicyManifest {
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.trusted_workflows
            .iter()
            .chain(self.security_policies.iter())
    }

    /// Compile every `regex` leaf pattern. Invalid patterns refuse the
    /// manifest.
    pub fn compile(&mut self) -> Result<(), GatewayError> {
        let mut patterns = Vec::new();
        for rule in self.rules() {
            rule.matcher.for_each_leaf(&mut |leaf| {
                if leaf.operator == MatchOp::Regex {
                    if let Some(serde_json::Value::String(p)) = &leaf.value {
                        patterns.push(p.clone());
                    }
                }
            });
        }

        for pattern in patterns {
            if self.compiled_regexes.contains_key(&pattern) {
                continue;
            }
            let re = Regex::new(&pattern).map_err(|e| {
                GatewayError::Policy(format!("invalid regex pattern '{pattern}': {e}"))
            })?;
            self.compiled_regexes.insert(pattern, re);
        }
        Ok(())
    }
}
