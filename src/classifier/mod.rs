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

//! Risk classification.
//!
//! Maps `(tool, args, context)` to a probabilistic assessment. Side-effect
//! free; the interceptor enforces the classification budget and substitutes
//! `RiskAssessment::unavailable()` when it is missed, so the deterministic
//! policy phases always run.

pub mod remote;
pub mod rules;

use crate::engine_core::models::{CallContext, RiskAssessment};
use async_trait::async_trait;

#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(
        &self,
        tool: &str,
        args: &serde_json::Value,
        context: &CallContext,
    ) -> RiskAssessment;
}

pub use remote::RemoteClassifier;
pub use rules::RuleClassifier;
