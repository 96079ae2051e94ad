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

//! Process configuration from environment variables. Loaded once at
//! startup; components receive an immutable `Arc<Config>` snapshot.

use crate::engine_core::constants::config as env_names;
use crate::engine_core::errors::GatewayError;
use crate::engine_core::models::ContextDefaults;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub policy_path: Option<PathBuf>,
    pub scenario_path: Option<PathBuf>,
    pub ledger_path: PathBuf,
    pub keys_dir: PathBuf,
    pub port: u16,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
    pub context_defaults: ContextDefaults,
    pub classifier_endpoint: Option<String>,
    pub classifier_model: Option<String>,
    pub classifier_api_key: Option<String>,
    pub backend_url: Option<String>,
    pub prime_kid: String,
    pub shadow_kid: String,
}

impl Config {
    pub fn from_env() -> Result<Self, GatewayError> {
        let port = match env::var(env_names::ENV_PORT) {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                GatewayError::Configuration(format!("invalid {}: '{raw}'", env_names::ENV_PORT))
            })?,
            Err(_) => 8787,
        };

        Ok(Self {
            policy_path: env::var(env_names::ENV_POLICY_PATH).ok().map(PathBuf::from),
            scenario_path: env::var(env_names::ENV_SCENARIO_PATH)
                .ok()
                .map(PathBuf::from),
            ledger_path: env::var(env_names::ENV_LEDGER_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("chimera_ledger.jsonl")),
            keys_dir: env::var(env_names::ENV_KEYS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("keys")),
            port,
            log_level: env::var(env_names::ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string()),
            log_format: env::var(env_names::ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string()),
            context_defaults: ContextDefaults {
                user_id: env::var(env_names::ENV_DEFAULT_USER_ID).ok(),
                user_role: env::var(env_names::ENV_DEFAULT_USER_ROLE).ok(),
                source: env::var(env_names::ENV_DEFAULT_SOURCE).ok(),
            },
            classifier_endpoint: env::var(env_names::ENV_CLASSIFIER_ENDPOINT).ok(),
            classifier_model: env::var(env_names::ENV_CLASSIFIER_MODEL).ok(),
            classifier_api_key: env::var(env_names::ENV_CLASSIFIER_API_KEY).ok(),
            backend_url: env::var(env_names::ENV_BACKEND_URL).ok(),
            prime_kid: env::var(env_names::ENV_PRIME_KID).unwrap_or_else(|_| "slot-a".to_string()),
            shadow_kid: env::var(env_names::ENV_SHADOW_KID)
                .unwrap_or_else(|_| "slot-b".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_path: None,
            scenario_path: None,
            ledger_path: PathBuf::from("chimera_ledger.jsonl"),
            keys_dir: PathBuf::from("keys"),
            port: 8787,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            context_defaults: ContextDefaults::default(),
            classifier_endpoint: None,
            classifier_model: None,
            classifier_api_key: None,
            backend_url: None,
            prime_kid: "slot-a".to_string(),
            shadow_kid: "slot-b".to_string(),
        }
    }
}
