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

//! chimera: a transparent deception middleware for MCP.
//!
//! This library provides the core logic for the chimera gateway, which sits
//! between an AI agent and a tools/call backend and routes every tool
//! invocation to either the production data plane or a schema-identical
//! shadow plane. Routing is enforced with dual-keyed signed warrants that
//! the execution environment verifies before selecting a data store.

pub mod authority;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod engine_core;
pub mod exec;
pub mod mcp;
pub mod utils;
