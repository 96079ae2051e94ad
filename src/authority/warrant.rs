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

//! Warrant issuance and verification.
//!
//! A warrant is a compact RS256 token whose signing key IS the routing
//! decision. The claim set is identical for both routes and carries no risk
//! score; a compromised backend learns nothing about the threat verdict.
//! Expiry is half-open `[iat, exp)`: a warrant presented exactly at `exp`
//! is rejected. jsonwebtoken's own exp validation is disabled and the
//! boundary is enforced manually for exact semantics.

use crate::authority::keyring::Keyring;
use crate::engine_core::constants::warrant as warrant_consts;
use crate::engine_core::errors::GatewayError;
use crate::engine_core::models::{Route, SessionId};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub tool: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

fn base_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[warrant_consts::AUDIENCE]);
    validation.set_issuer(&[warrant_consts::ISSUER]);
    validation.leeway = 0;
    // Half-open expiry is enforced by the caller against an explicit clock.
    validation.validate_exp = false;
    validation
}

fn check_window(claims: &WarrantClaims, now: u64) -> Result<(), GatewayError> {
    if now < claims.iat || now >= claims.exp {
        return Err(GatewayError::Authority("warrant outside validity window".to_string()));
    }
    Ok(())
}

/// Issues warrants with the keyring and resolves presented warrants back to
/// a route.
pub struct CredentialAuthority {
    keyring: Keyring,
    ttl_secs: u64,
}

impl CredentialAuthority {
    pub fn new(keyring: Keyring) -> Self {
        Self {
            keyring,
            ttl_secs: warrant_consts::DEFAULT_TTL_SECS,
        }
    }

    pub fn with_ttl(keyring: Keyring, ttl_secs: u64) -> Self {
        Self { keyring, ttl_secs }
    }

    pub fn issue(
        &self,
        session_id: &SessionId,
        tool: &str,
        route: Route,
    ) -> Result<String, GatewayError> {
        self.issue_at(session_id, tool, route, crate::utils::time::now() as u64)
    }

    /// Clock-injected issuance for deterministic tests.
    pub fn issue_at(
        &self,
        session_id: &SessionId,
        tool: &str,
        route: Route,
        now: u64,
    ) -> Result<String, GatewayError> {
        let slot = self.keyring.slot(route);
        let claims = WarrantClaims {
            iss: warrant_consts::ISSUER.to_string(),
            sub: session_id.to_string(),
            aud: warrant_consts::AUDIENCE.to_string(),
            tool: tool.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(slot.kid.clone());

        encode(&header, &claims, &slot.encoding)
            .map_err(|e| GatewayError::Authority(format!("signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<(Route, WarrantClaims), GatewayError> {
        self.verify_at(token, crate::utils::time::now() as u64)
    }

    /// Full-ring verification: the kid selects exactly one public key;
    /// unknown kids are rejected. The error never says which key was tried.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<(Route, WarrantClaims), GatewayError> {
        let header =
            decode_header(token).map_err(|_| GatewayError::Authority("malformed warrant".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| GatewayError::Authority("warrant missing kid".to_string()))?;
        let route = self
            .keyring
            .route_for_kid(&kid)
            .ok_or_else(|| GatewayError::Authority("warrant rejected".to_string()))?;

        let data = decode::<WarrantClaims>(token, &self.keyring.slot(route).decoding, &base_validation())
            .map_err(|_| GatewayError::Authority("warrant rejected".to_string()))?;
        check_window(&data.claims, now)?;
        Ok((route, data.claims))
    }
}

/// Plane-side verifier holding exactly one public key. The production data
/// store is given the prime key only, the shadow store the shadow key only;
/// a warrant signed for the other plane fails here.
pub struct WarrantVerifier {
    kid: String,
    key: DecodingKey,
}

impl WarrantVerifier {
    pub fn new(kid: impl Into<String>, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            key,
        }
    }

    pub fn from_public_pem(kid: impl Into<String>, pem: &[u8]) -> Result<Self, GatewayError> {
        Ok(Self {
            kid: kid.into(),
            key: DecodingKey::from_rsa_pem(pem)
                .map_err(|e| GatewayError::Configuration(format!("bad public key: {e}")))?,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn verify(&self, token: &str) -> Result<WarrantClaims, GatewayError> {
        self.verify_at(token, crate::utils::time::now() as u64)
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<WarrantClaims, GatewayError> {
        let header =
            decode_header(token).map_err(|_| GatewayError::Authority("malformed warrant".to_string()))?;
        if header.kid.as_deref() != Some(self.kid.as_str()) {
            return Err(GatewayError::Authority("warrant rejected".to_string()));
        }

        let data = decode::<WarrantClaims>(token, &self.key, &base_validation())
            .map_err(|_| GatewayError::Authority("warrant rejected".to_string()))?;
        check_window(&data.claims, now)?;
        Ok(data.claims)
    }
}
