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

//! Data planes.
//!
//! Both planes expose the same surface: record lookup by collection and id,
//! and file reads under a plane-specific root. The production store answers
//! from real rows and the real filesystem; the shadow store fabricates a
//! stable record or file for any miss, so it has no observable "not found".

use crate::engine_core::errors::GatewayError;
use crate::exec::scenario::{CollectionSpec, ScenarioConfig};
use crate::exec::synth;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn lookup(&self, collection: &str, id: &Value) -> Result<Option<Value>, GatewayError>;
    async fn read_file(&self, path: &str) -> Result<Option<String>, GatewayError>;
}

/// Join `path` under `root`, refusing traversal out of the plane.
fn resolve_under_root(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = path.trim_start_matches('/');
    let candidate = Path::new(relative);
    if candidate
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }
    Some(root.join(candidate))
}

fn index_rows(
    collections: &HashMap<String, CollectionSpec>,
    pick: impl Fn(&CollectionSpec) -> &[Value],
) -> HashMap<(String, String), Value> {
    let mut records = HashMap::new();
    for (name, spec) in collections {
        for row in pick(spec) {
            if let Some(id) = row.get(&spec.id_field) {
                records.insert((name.clone(), synth::canonical_id(id)), row.clone());
            }
        }
    }
    records
}

/// Real records, real files.
pub struct ProductionStore {
    root: PathBuf,
    records: Mutex<HashMap<(String, String), Value>>,
}

impl ProductionStore {
    pub fn from_scenario(scenario: &ScenarioConfig) -> Self {
        Self {
            root: scenario.production_root.clone(),
            records: Mutex::new(index_rows(&scenario.collections, |s| &s.production_rows)),
        }
    }
}

#[async_trait]
impl DataStore for ProductionStore {
    async fn lookup(&self, collection: &str, id: &Value) -> Result<Option<Value>, GatewayError> {
        let key = (collection.to_string(), synth::canonical_id(id));
        Ok(self.records.lock().await.get(&key).cloned())
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, GatewayError> {
        let Some(resolved) = resolve_under_root(&self.root, path) else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GatewayError::Backend(format!("file read failed: {e}"))),
        }
    }
}

/// Synthetic records, fabricated files. Misses are generated
/// deterministically per id and persisted so repeat reads are stable.
pub struct ShadowStore {
    root: PathBuf,
    specs: HashMap<String, CollectionSpec>,
    records: Mutex<HashMap<(String, String), Value>>,
}

impl ShadowStore {
    pub fn from_scenario(scenario: &ScenarioConfig) -> Self {
        Self {
            root: scenario.shadow_root.clone(),
            specs: scenario.collections.clone(),
            records: Mutex::new(index_rows(&scenario.collections, |s| &s.shadow_rows)),
        }
    }
}

#[async_trait]
impl DataStore for ShadowStore {
    async fn lookup(&self, collection: &str, id: &Value) -> Result<Option<Value>, GatewayError> {
        let key = (collection.to_string(), synth::canonical_id(id));
        let mut records = self.records.lock().await;
        if let Some(found) = records.get(&key) {
            return Ok(Some(found.clone()));
        }

        let Some(spec) = self.specs.get(collection) else {
            return Ok(None);
        };

        let fabricated = synth::synthesize_record(collection, spec, id);
        debug!(collection, id = %key.1, "synthesized shadow record");
        records.insert(key, fabricated.clone());
        Ok(Some(fabricated))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, GatewayError> {
        let Some(resolved) = resolve_under_root(&self.root, path) else {
            // Traversal attempts get a fabricated document, not a refusal.
            return Ok(Some(synth::synthesize_file(path)));
        };

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let fabricated = synth::synthesize_file(path);
                if let Some(parent) = resolved.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                if let Err(write_err) = tokio::fs::write(&resolved, &fabricated).await {
                    debug!("could not persist fabricated file: {write_err}");
                }
                Ok(Some(fabricated))
            }
            Err(e) => Err(GatewayError::Backend(format!("file read failed: {e}"))),
        }
    }
}
