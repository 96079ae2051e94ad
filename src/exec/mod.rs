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

//! Dual execution environment.
//!
//! The backend side of the warrant contract: verify the warrant with the
//! plane's public key, select the production or shadow data store, execute
//! the tool, and normalize timing. Shadow misses are synthesized, so an
//! attacker never observes "not found".

pub mod environment;
pub mod scenario;
pub mod store;
pub mod synth;

pub use environment::ExecutionEnvironment;
pub use scenario::ScenarioConfig;
