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

// Comprehensive manifest validation - fail-fast at config load time

use crate::engine::manifest::{PolicyManifest, Rule, KNOWN_PHASES};
use crate::engine_core::errors::GatewayError;
use crate::engine_core::sanitizer::ResponseSanitizer;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and validates the policy manifest. Any inconsistency refuses
/// startup; evaluation never sees a half-valid manifest.
pub struct PolicyLoader;

impl PolicyLoader {
    /// Load from YAML, compile regexes, validate. Returns the manifest and
    /// the sha256 digest of the file so ledger review can pin decisions to
    /// a policy version.
    pub fn load(path: &Path) -> Result<(PolicyManifest, String), GatewayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        let digest = hex::encode(Sha256::digest(raw.as_bytes()));

        let mut manifest: PolicyManifest = serde_yaml_ng::from_str(&raw)
            .map_err(|e| GatewayError::Policy(format!("manifest parse error: {e}")))?;

        manifest.compile()?;
        Self::validate(&manifest)?;
        Ok((manifest, digest))
    }

    pub fn validate(manifest: &PolicyManifest) -> Result<(), GatewayError> {
        Self::validate_order(manifest)?;

        let mut seen_ids = HashSet::new();
        for rule in manifest.rules() {
            Self::validate_rule(rule)?;
            if !seen_ids.insert(rule.id.as_str()) {
                return Err(GatewayError::Policy(format!(
                    "duplicate rule id '{}'",
                    rule.id
                )));
            }
        }

        for clause in [&manifest.accumulated_risk, &manifest.event_risk]
            .into_iter()
            .flatten()
        {
            if !clause.threshold.is_finite() || clause.threshold < 0.0 {
                return Err(GatewayError::Policy(format!(
                    "threshold must be a non-negative number, got {}",
                    clause.threshold
                )));
            }
            if let Some(floor) = clause.confidence_floor {
                if !(0.0..=1.0).contains(&floor) {
                    return Err(GatewayError::Policy(format!(
                        "confidence_floor must lie in [0, 1], got {floor}"
                    )));
                }
            }
        }

        // Sanitizer rules must compile; build once and discard.
        ResponseSanitizer::with_rules(&manifest.sanitizer)?;

        Ok(())
    }

    fn validate_order(manifest: &PolicyManifest) -> Result<(), GatewayError> {
        let mut seen = HashSet::new();
        for phase in &manifest.evaluation_order {
            if !KNOWN_PHASES.contains(&phase.as_str()) {
                return Err(GatewayError::Policy(format!(
                    "unknown phase '{phase}' in evaluation_order (known: {})",
                    KNOWN_PHASES.join(", ")
                )));
            }
            if !seen.insert(phase.as_str()) {
                return Err(GatewayError::Policy(format!(
                    "phase '{phase}' listed twice in evaluation_order"
                )));
            }
        }
        Ok(())
    }

    fn validate_rule(rule: &Rule) -> Result<(), GatewayError> {
        if rule.id.is_empty() {
            return Err(GatewayError::Policy("rule with empty id".to_string()));
        }

        if rule.allow_only && rule.action != crate::engine_core::models::Route::Production {
            return Err(GatewayError::Policy(format!(
                "rule '{}' is flagged allow-only but routes to {}",
                rule.id, rule.action
            )));
        }

        let mut leaf_error = None;
        rule.matcher.for_each_leaf(&mut |leaf| {
            if leaf_error.is_some() {
                return;
            }
            // Dotted paths must root at the call snapshot.
            if !(leaf.field.starts_with("args.") || leaf.field.starts_with("context.")) {
                leaf_error = Some(format!(
                    "rule '{}': field '{}' must start with 'args.' or 'context.'",
                    rule.id, leaf.field
                ));
                return;
            }
            match (&leaf.value, &leaf.value_from_context) {
                (None, None) => {
                    leaf_error = Some(format!(
                        "rule '{}': leaf on '{}' needs 'value' or 'value_from_context'",
                        rule.id, leaf.field
                    ));
                }
                (Some(_), Some(_)) => {
                    leaf_error = Some(format!(
                        "rule '{}': leaf on '{}' cannot set both 'value' and 'value_from_context'",
                        rule.id, leaf.field
                    ));
                }
                _ => {}
            }
        });
        if let Some(msg) = leaf_error {
            return Err(GatewayError::Policy(msg));
        }

        Ok(())
    }
}
