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

//! Offline rule classifier.
//!
//! A list of pattern rules evaluated top-to-bottom; the first match wins.
//! Leaves reuse the policy matcher's operator set over the snapshot
//! `{tool, args, context}`. Used when no remote judge is configured, and as
//! a deterministic stand-in under test.

use crate::classifier::RiskClassifier;
use crate::engine::manifest::{MatchLeaf, MatchNode};
use crate::engine::matcher;
use crate::engine_core::models::{CallContext, RiskAssessment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRule {
    #[serde(flatten)]
    pub leaf: MatchLeaf,
    pub risk: f64,
    #[serde(default = "ClassifierRule::default_confidence")]
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ClassifierRule {
    fn default_confidence() -> f64 {
        1.0
    }
}

pub struct RuleClassifier {
    rules: Vec<ClassifierRule>,
}

impl RuleClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Everything scores zero; routing falls to the deterministic phases.
    pub fn permissive() -> Self {
        Self { rules: Vec::new() }
    }
}

#[async_trait]
impl RiskClassifier for RuleClassifier {
    async fn classify(
        &self,
        tool: &str,
        args: &serde_json::Value,
        context: &CallContext,
    ) -> RiskAssessment {
        let snapshot = json!({
            "tool": tool,
            "args": args,
            "context": context.to_value(),
        });
        let no_regex_cache = HashMap::new();

        for rule in &self.rules {
            let node = MatchNode::Leaf(rule.leaf.clone());
            if matcher::evaluate_node(&node, &snapshot, &no_regex_cache) {
                return RiskAssessment::new(rule.risk, rule.confidence, rule.reason.clone())
                    .with_tags(rule.tags.iter().cloned());
            }
        }

        RiskAssessment::new(0.0, 1.0, "no classifier rule matched")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::manifest::MatchOp;

    fn rule(field: &str, op: MatchOp, value: serde_json::Value, risk: f64) -> ClassifierRule {
        ClassifierRule {
            leaf: MatchLeaf {
                field: field.to_string(),
                operator: op,
                value: Some(value),
                value_from_context: None,
            },
            risk,
            confidence: 0.9,
            reason: format!("rule on {field}"),
            tags: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let classifier = RuleClassifier::new(vec![
            rule("tool", MatchOp::Eq, json!("read_file"), 0.4),
            rule("args.filename", MatchOp::Contains, json!("formula"), 0.95),
        ]);

        let assessment = classifier
            .classify(
                "read_file",
                &json!({"filename": "/data/private/_CONF_chimera_formula.json"}),
                &CallContext::default(),
            )
            .await;
        // The tool rule is declared first, so the filename rule never runs.
        assert_eq!(assessment.risk, 0.4);
    }

    #[tokio::test]
    async fn no_match_scores_zero() {
        let classifier = RuleClassifier::new(vec![rule(
            "tool",
            MatchOp::Eq,
            json!("send_email"),
            0.8,
        )]);
        let assessment = classifier
            .classify("read_file", &json!({}), &CallContext::default())
            .await;
        assert_eq!(assessment.risk, 0.0);
        assert_eq!(assessment.confidence, 1.0);
    }

    #[tokio::test]
    async fn classification_is_side_effect_free_and_stable() {
        let classifier = RuleClassifier::new(vec![rule(
            "args.query",
            MatchOp::Contains,
            json!("drop table"),
            1.0,
        )]);
        let args = json!({"query": "drop table users"});
        let a = classifier.classify("query_db", &args, &CallContext::default()).await;
        let b = classifier.classify("query_db", &args, &CallContext::default()).await;
        assert_eq!(a, b);
        assert_eq!(a.risk, 1.0);
    }
}
