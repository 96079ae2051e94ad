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

//! chimera Gateway Constants - Single source of truth for all configuration values.
//!
//! This module centralizes magic numbers, error codes, and configuration
//! constants to ensure consistency and maintainability.

/// JSON-RPC 2.0 Error Codes
pub mod jsonrpc {
    /// Backend failure or timeout surfaced to the agent (custom code)
    pub const ERROR_BACKEND: i32 = -32000;
    /// Warrant verification failure inside the execution environment (custom code)
    pub const ERROR_AUTH: i32 = -32001;
    /// Method not found (standard JSON-RPC)
    pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid request (standard JSON-RPC)
    pub const ERROR_INVALID_REQUEST: i32 = -32600;
    /// Internal error (standard JSON-RPC)
    pub const ERROR_INTERNAL: i32 = -32603;
    /// Parse error (standard JSON-RPC)
    pub const ERROR_PARSE: i32 = -32700;
}

/// Warrant issuance and wire placement
pub mod warrant {
    /// Reserved parameter key the gateway injects into forwarded arguments
    pub const RESERVED_PARAM: &str = "__chimera_warrant__";
    /// JWT issuer claim
    pub const ISSUER: &str = "chimera";
    /// JWT audience claim
    pub const AUDIENCE: &str = "backend";
    /// Warrant lifetime in seconds
    pub const DEFAULT_TTL_SECS: u64 = 3600;
}

/// Forensic ledger
pub mod ledger {
    /// Genesis prev_hash: 32 zero bytes, hex-encoded. The chain anchor is
    /// fixed so independent verifiers agree on entry zero.
    pub const GENESIS_PREV_HASH: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";
    /// Consecutive write failures tolerated before escalating to shutdown
    pub const WRITE_FAILURE_LIMIT: u32 = 5;
}

/// Session risk accounting
pub mod session {
    /// Trailing accumulation window in seconds
    pub const DEFAULT_RISK_WINDOW_SECS: u64 = 3600;
    /// Idle sessions are evicted after this many seconds
    pub const DEFAULT_IDLE_TTL_SECS: u64 = 24 * 3600;
}

/// Deadlines
pub mod timeouts {
    /// Risk classifier budget in milliseconds; over budget is treated as unavailable
    pub const CLASSIFIER_BUDGET_MS: u64 = 2000;
    /// Backend forward deadline in seconds
    pub const BACKEND_DEADLINE_SECS: u64 = 30;
}

/// Shadow-plane timing normalization
pub mod jitter {
    pub const MIN_MS: u64 = 20;
    pub const MAX_MS: u64 = 50;
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_POLICY_PATH: &str = "CHIMERA_POLICY_PATH";
    pub const ENV_SCENARIO_PATH: &str = "CHIMERA_SCENARIO_PATH";
    pub const ENV_LEDGER_PATH: &str = "CHIMERA_LEDGER_PATH";
    pub const ENV_KEYS_DIR: &str = "CHIMERA_KEYS_DIR";
    pub const ENV_PORT: &str = "CHIMERA_PORT";
    pub const ENV_LOG_LEVEL: &str = "CHIMERA_LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "CHIMERA_LOG_FORMAT";
    pub const ENV_DEFAULT_USER_ID: &str = "CHIMERA_USER_ID";
    pub const ENV_DEFAULT_USER_ROLE: &str = "CHIMERA_USER_ROLE";
    pub const ENV_DEFAULT_SOURCE: &str = "CHIMERA_SOURCE";
    pub const ENV_CLASSIFIER_ENDPOINT: &str = "CHIMERA_CLASSIFIER_ENDPOINT";
    pub const ENV_CLASSIFIER_MODEL: &str = "CHIMERA_CLASSIFIER_MODEL";
    pub const ENV_CLASSIFIER_API_KEY: &str = "CHIMERA_CLASSIFIER_API_KEY";
    pub const ENV_BACKEND_URL: &str = "CHIMERA_BACKEND_URL";
    pub const ENV_PRIME_KID: &str = "CHIMERA_PRIME_KID";
    pub const ENV_SHADOW_KID: &str = "CHIMERA_SHADOW_KID";
}

/// MCP Protocol Methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Transport Limits (DoS Protection)
pub mod limits {
    /// Maximum allowed JSON-RPC message size (10 MB)
    pub const MAX_MESSAGE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
}
