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

//! Core domain of the chimera gateway.
//!
//! Pure state and orchestration: session store, forensic ledger, response
//! sanitizer, and the per-call interceptor pipeline. No wire formats here.

pub mod constants;
pub mod errors;
pub mod interceptor;
pub mod ledger;
pub mod models;
pub mod sanitizer;
pub mod session;
