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

//! Phase-ordered policy evaluation.
//!
//! Executes the manifest's phases in declared order and returns on the
//! first phase that produces an action. Pure: takes a snapshot of the call
//! and returns a decision; all I/O (risk recording, ledger) is performed by
//! the interceptor.

use crate::engine::manifest::{
    PolicyManifest, Rule, ThresholdClause, ThresholdField, ThresholdOp, PHASE_ACCUMULATED_RISK,
    PHASE_DIRECTIVES, PHASE_EVENT_RISK, PHASE_SECURITY_POLICIES, PHASE_TRUSTED_WORKFLOWS,
};
use crate::engine::matcher;
use crate::engine_core::models::{CallContext, RiskAssessment, RouteDecision};
use serde_json::json;
use tracing::trace;

pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Evaluate the manifest against one call. Deterministic for identical
    /// `(tool, args, context, assessment, accumulated_risk)` inputs.
    pub fn evaluate(
        manifest: &PolicyManifest,
        tool: &str,
        args: &serde_json::Value,
        context: &CallContext,
        assessment: &RiskAssessment,
        accumulated_risk: f64,
    ) -> RouteDecision {
        let snapshot = json!({
            "args": args,
            "context": context.to_value(),
        });

        for phase in &manifest.evaluation_order {
            let decision = match phase.as_str() {
                PHASE_DIRECTIVES => Self::directives(manifest, context, phase),
                PHASE_TRUSTED_WORKFLOWS => {
                    Self::rule_list(manifest, &manifest.trusted_workflows, tool, &snapshot, phase)
                }
                PHASE_SECURITY_POLICIES => {
                    Self::rule_list(manifest, &manifest.security_policies, tool, &snapshot, phase)
                }
                PHASE_ACCUMULATED_RISK => Self::threshold(
                    manifest.accumulated_risk.as_ref(),
                    assessment,
                    accumulated_risk,
                    phase,
                ),
                PHASE_EVENT_RISK => Self::threshold(
                    manifest.event_risk.as_ref(),
                    assessment,
                    accumulated_risk,
                    phase,
                ),
                // The loader rejects unknown phase names; if one slips
                // through a hot-reload it simply produces no action.
                _ => None,
            };

            if let Some(decision) = decision {
                trace!(phase, route = %decision.route, "phase produced action");
                return decision;
            }
        }

        RouteDecision {
            route: manifest.default_action,
            reason: "no phase produced an action".to_string(),
            rule_id: None,
            phase: "default".to_string(),
        }
    }

    /// Indexed lookup on exact user_id, then user_role.
    fn directives(
        manifest: &PolicyManifest,
        context: &CallContext,
        phase: &str,
    ) -> Option<RouteDecision> {
        if let Some(user_id) = &context.user_id {
            if let Some(entry) = manifest.directives.users.get(user_id) {
                return Some(RouteDecision {
                    route: entry.action,
                    reason: entry.reason.clone(),
                    rule_id: Some(format!("user:{user_id}")),
                    phase: phase.to_string(),
                });
            }
        }
        if let Some(role) = &context.user_role {
            if let Some(entry) = manifest.directives.roles.get(role) {
                return Some(RouteDecision {
                    route: entry.action,
                    reason: entry.reason.clone(),
                    rule_id: Some(format!("role:{role}")),
                    phase: phase.to_string(),
                });
            }
        }
        None
    }

    /// Rules in declared order; first whose tree matches (and whose tool
    /// whitelist admits the call) wins.
    fn rule_list(
        manifest: &PolicyManifest,
        rules: &[Rule],
        tool: &str,
        snapshot: &serde_json::Value,
        phase: &str,
    ) -> Option<RouteDecision> {
        for rule in rules {
            if let Some(tools) = &rule.tools {
                if !tools.iter().any(|t| t == tool) {
                    continue;
                }
            }
            if matcher::evaluate_node(&rule.matcher, snapshot, &manifest.compiled_regexes) {
                return Some(RouteDecision {
                    route: rule.action,
                    reason: rule.reason.clone(),
                    rule_id: Some(rule.id.clone()),
                    phase: phase.to_string(),
                });
            }
        }
        None
    }

    fn threshold(
        clause: Option<&ThresholdClause>,
        assessment: &RiskAssessment,
        accumulated_risk: f64,
        phase: &str,
    ) -> Option<RouteDecision> {
        let clause = clause?;

        if let Some(floor) = clause.confidence_floor {
            if assessment.confidence < floor {
                return None;
            }
        }

        let observed = match clause.field {
            ThresholdField::AccumulatedRisk => accumulated_risk,
            ThresholdField::EventRisk => assessment.risk,
        };

        let fired = match clause.operator {
            ThresholdOp::Gte => observed >= clause.threshold,
            ThresholdOp::Gt => observed > clause.threshold,
        };

        fired.then(|| RouteDecision {
            route: clause.action,
            reason: clause.reason.clone(),
            rule_id: None,
            phase: phase.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_core::models::Route;
    use serde_json::json;

    fn manifest(yaml: &str) -> PolicyManifest {
        let mut m: PolicyManifest = serde_yaml_ng::from_str(yaml).unwrap();
        m.compile().unwrap();
        m
    }

    fn ctx(user_id: &str, role: &str) -> CallContext {
        CallContext {
            user_id: Some(user_id.to_string()),
            user_role: Some(role.to_string()),
            ..CallContext::default()
        }
    }

    const BASE: &str = r#"
default_action: production
directives:
  users:
    mallory: { action: shadow, reason: "Quarantined account" }
trusted_workflows:
  - id: dr-chen-production
    tools: [read_file]
    match:
      all:
        - { field: context.user_id, operator: eq, value: dr_chen }
    action: production
    allow_only: true
    reason: "Founding researcher workflow"
security_policies:
  - id: taint-lockdown
    match:
      all:
        - { field: context.is_tainted, operator: eq, value: true }
        - { field: context.tool_category, operator: eq, value: sensitive }
    action: shadow
    reason: "Tainted session touching sensitive tools"
accumulated_risk:
  field: accumulated_risk
  operator: gte
  threshold: 1.5
  action: shadow
  reason: "Session risk budget exceeded"
event_risk:
  field: event_risk
  operator: gte
  threshold: 0.85
  action: shadow
  reason: "High single-event risk"
  confidence_floor: 0.5
"#;

    #[test]
    fn trusted_workflow_beats_risk_threshold() {
        let m = manifest(BASE);
        // Classifier screams, but the explicit allow fires in an earlier
        // phase.
        let assessment = RiskAssessment::new(0.95, 0.9, "looks like exfiltration");
        let decision = PolicyEvaluator::evaluate(
            &m,
            "read_file",
            &json!({"filename": "/data/private/_CONF_chimera_formula.json"}),
            &ctx("dr_chen", "lead_researcher"),
            &assessment,
            0.95,
        );
        assert_eq!(decision.route, Route::Production);
        assert_eq!(decision.rule_id.as_deref(), Some("dr-chen-production"));
        assert_eq!(decision.phase, "trusted_workflows");
    }

    #[test]
    fn directive_lookup_wins_first() {
        let m = manifest(BASE);
        let decision = PolicyEvaluator::evaluate(
            &m,
            "read_file",
            &json!({}),
            &ctx("mallory", "lead_researcher"),
            &RiskAssessment::unavailable(),
            0.0,
        );
        assert_eq!(decision.route, Route::Shadow);
        assert_eq!(decision.phase, "directives");
        assert_eq!(decision.rule_id.as_deref(), Some("user:mallory"));
    }

    #[test]
    fn tainted_sensitive_call_goes_shadow() {
        let m = manifest(BASE);
        let mut context = ctx("hr_user", "hr_manager");
        context.is_tainted = true;
        context.tool_category = Some("sensitive".to_string());

        let decision = PolicyEvaluator::evaluate(
            &m,
            "get_patient_record",
            &json!({"patient_id": 100}),
            &context,
            &RiskAssessment::new(0.3, 0.8, "routine"),
            0.3,
        );
        assert_eq!(decision.route, Route::Shadow);
        assert_eq!(decision.rule_id.as_deref(), Some("taint-lockdown"));
    }

    #[test]
    fn accumulated_threshold_uses_gte_at_boundary() {
        let m = manifest(BASE);
        let context = ctx("analyst", "analyst");
        let assessment = RiskAssessment::new(0.2, 0.9, "routine");

        let below =
            PolicyEvaluator::evaluate(&m, "query_db", &json!({}), &context, &assessment, 1.4999);
        assert_eq!(below.route, Route::Production);

        let at = PolicyEvaluator::evaluate(&m, "query_db", &json!({}), &context, &assessment, 1.5);
        assert_eq!(at.route, Route::Shadow);
        assert_eq!(at.phase, "accumulated_risk");
    }

    #[test]
    fn event_threshold_respects_confidence_floor() {
        let m = manifest(BASE);
        let context = ctx("analyst", "analyst");

        let shaky = RiskAssessment::new(0.9, 0.2, "uncertain");
        let decision =
            PolicyEvaluator::evaluate(&m, "query_db", &json!({}), &context, &shaky, 0.9);
        assert_eq!(decision.route, Route::Production);
        assert_eq!(decision.phase, "default");

        let confident = RiskAssessment::new(0.9, 0.8, "clear signal");
        let decision =
            PolicyEvaluator::evaluate(&m, "query_db", &json!({}), &context, &confident, 0.9);
        assert_eq!(decision.route, Route::Shadow);
        assert_eq!(decision.phase, "event_risk");
    }

    #[test]
    fn first_match_wins_within_a_phase() {
        let m = manifest(
            r#"
default_action: production
security_policies:
  - id: first-allow
    match: { field: context.user_role, operator: eq, value: auditor }
    action: production
    reason: "Auditors read production"
  - id: later-shadow
    match: { field: context.user_role, operator: eq, value: auditor }
    action: shadow
    reason: "Should never fire"
"#,
        );
        let decision = PolicyEvaluator::evaluate(
            &m,
            "read_file",
            &json!({}),
            &ctx("a1", "auditor"),
            &RiskAssessment::unavailable(),
            0.0,
        );
        assert_eq!(decision.route, Route::Production);
        assert_eq!(decision.rule_id.as_deref(), Some("first-allow"));
    }

    #[test]
    fn evaluation_is_deterministic_on_same_snapshot() {
        let m = manifest(BASE);
        let context = ctx("analyst", "analyst");
        let assessment = RiskAssessment::new(0.4, 0.7, "steady");
        let first =
            PolicyEvaluator::evaluate(&m, "query_db", &json!({"q": "x"}), &context, &assessment, 0.4);
        let second =
            PolicyEvaluator::evaluate(&m, "query_db", &json!({"q": "x"}), &context, &assessment, 0.4);
        assert_eq!(first, second);
    }

    #[test]
    fn default_action_when_no_phase_fires() {
        let m = manifest("default_action: shadow\n");
        let decision = PolicyEvaluator::evaluate(
            &m,
            "anything",
            &json!({}),
            &CallContext::default(),
            &RiskAssessment::unavailable(),
            0.0,
        );
        assert_eq!(decision.route, Route::Shadow);
        assert_eq!(decision.phase, "default");
    }
}
