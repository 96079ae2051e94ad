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

//! Gateway error taxonomy.
//!
//! Recoverable signals (classifier unavailable, transient ledger failure)
//! are handled inside their component and never reach the agent. Everything
//! the agent can observe is either a successful tool response or a generic
//! JSON-RPC error; which plane answered is never on the wire.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Malformed JSON-RPC framing; surfaced as a parse error (-32700).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Warrant signing or verification failure. Fatal for the call.
    #[error("authority error: {0}")]
    Authority(String),

    /// The classifier missed its budget or returned garbage. Recovered
    /// locally with a zeroed assessment; deterministic phases still run.
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Manifest inconsistency detected at load time. The gateway refuses
    /// to start.
    #[error("policy error: {0}")]
    Policy(String),

    #[error("backend deadline exceeded")]
    BackendTimeout,

    #[error("backend error: {0}")]
    Backend(String),

    /// The call still completes; the entry is queued for retry.
    #[error("ledger write failed: {0}")]
    LedgerWrite(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("scenario error: {0}")]
    Scenario(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
