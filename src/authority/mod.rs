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

//! Credential authority.
//!
//! Two independently generated asymmetric keypairs back the routing
//! decision: warrants for the production plane are signed with one key,
//! warrants for the shadow plane with the other. The claim sets are
//! schema-identical; only the signing key (and its opaque kid) differs.

pub mod keyring;
pub mod warrant;

pub use keyring::Keyring;
pub use warrant::{CredentialAuthority, WarrantClaims, WarrantVerifier};
