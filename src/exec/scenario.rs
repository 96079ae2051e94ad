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

//! Scenario schema.
//!
//! Declares the tool bindings, record collections (with their synthesis
//! templates and seed rows), and the filesystem roots of the two planes.
//! Seed generation itself is external; this module only parses the schema
//! it must deliver.

use crate::engine_core::errors::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// How a tool name maps onto the data store surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolBinding {
    /// Reads a file under the plane's filesystem root.
    FileRead { path_field: String },
    /// Looks up one record by id in a collection.
    RecordLookup { collection: String, id_field: String },
    /// Returns the arguments unchanged (diagnostics).
    Echo,
}

/// Field synthesis template. Both planes answer from the same template, so
/// responses are schema-identical; only values differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSpec {
    /// Copies the requested id.
    Id,
    /// Deterministic pick from a fixed option list.
    Choice { options: Vec<serde_json::Value> },
    /// Synthesized person name.
    Name,
    /// Number in `[min, max]`; integral when `integer` is set.
    Number {
        min: f64,
        max: f64,
        #[serde(default)]
        integer: bool,
    },
    /// Prefix plus a short deterministic hex suffix.
    Token { prefix: String },
    /// Constant value.
    Fixed { value: serde_json::Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub id_field: String,
    /// BTreeMap so synthesis walks fields in a stable order.
    pub fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub production_rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub shadow_rows: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub tools: HashMap<String, ToolBinding>,
    #[serde(default)]
    pub collections: HashMap<String, CollectionSpec>,
    pub production_root: PathBuf,
    pub shadow_root: PathBuf,
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("cannot read scenario {}: {e}", path.display()))
        })?;
        let scenario: ScenarioConfig = serde_yaml_ng::from_str(&raw)
            .map_err(|e| GatewayError::Scenario(format!("scenario parse error: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        for (tool, binding) in &self.tools {
            if let ToolBinding::RecordLookup { collection, .. } = binding {
                if !self.collections.contains_key(collection) {
                    return Err(GatewayError::Scenario(format!(
                        "tool '{tool}' references unknown collection '{collection}'"
                    )));
                }
            }
        }
        for (name, spec) in &self.collections {
            if spec.id_field.is_empty() {
                return Err(GatewayError::Scenario(format!(
                    "collection '{name}' has an empty id_field"
                )));
            }
            if !spec.fields.contains_key(&spec.id_field) {
                return Err(GatewayError::Scenario(format!(
                    "collection '{name}': id_field '{}' is not in the template",
                    spec.id_field
                )));
            }
        }
        Ok(())
    }
}
