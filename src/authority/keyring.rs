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

//! Dual-key material.
//!
//! Loads two RSA keypairs from independent PEM files under the key
//! directory. Private keys never leave this module's owning process; the
//! public halves are handed out per plane so each verifier knows exactly
//! one key.

use crate::engine_core::errors::GatewayError;
use crate::engine_core::models::Route;
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::path::Path;

/// File names under the key directory. The two pairs are generated and
/// stored independently; compromise of one must not yield the other.
const PRIME_PRIVATE: &str = "prime.pem";
const PRIME_PUBLIC: &str = "prime.pub.pem";
const SHADOW_PRIVATE: &str = "shadow.pem";
const SHADOW_PUBLIC: &str = "shadow.pub.pem";

pub struct KeySlot {
    pub kid: String,
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

pub struct Keyring {
    prime: KeySlot,
    shadow: KeySlot,
}

impl Keyring {
    /// Load both pairs from `dir`. Kids are opaque identifiers carried in
    /// the warrant header; they name a keyring slot, not a plane.
    pub fn load(dir: &Path, prime_kid: &str, shadow_kid: &str) -> Result<Self, GatewayError> {
        let read = |name: &str| -> Result<Vec<u8>, GatewayError> {
            std::fs::read(dir.join(name)).map_err(|e| {
                GatewayError::Configuration(format!(
                    "cannot read key file {}: {e}",
                    dir.join(name).display()
                ))
            })
        };

        Self::from_pems(
            prime_kid,
            &read(PRIME_PRIVATE)?,
            &read(PRIME_PUBLIC)?,
            shadow_kid,
            &read(SHADOW_PRIVATE)?,
            &read(SHADOW_PUBLIC)?,
        )
    }

    pub fn from_pems(
        prime_kid: &str,
        prime_private_pem: &[u8],
        prime_public_pem: &[u8],
        shadow_kid: &str,
        shadow_private_pem: &[u8],
        shadow_public_pem: &[u8],
    ) -> Result<Self, GatewayError> {
        if prime_kid == shadow_kid {
            return Err(GatewayError::Configuration(
                "prime and shadow kids must differ".to_string(),
            ));
        }

        let slot = |kid: &str, private: &[u8], public: &[u8]| -> Result<KeySlot, GatewayError> {
            Ok(KeySlot {
                kid: kid.to_string(),
                encoding: EncodingKey::from_rsa_pem(private)
                    .map_err(|e| GatewayError::Configuration(format!("bad private key: {e}")))?,
                decoding: DecodingKey::from_rsa_pem(public)
                    .map_err(|e| GatewayError::Configuration(format!("bad public key: {e}")))?,
            })
        };

        Ok(Self {
            prime: slot(prime_kid, prime_private_pem, prime_public_pem)?,
            shadow: slot(shadow_kid, shadow_private_pem, shadow_public_pem)?,
        })
    }

    pub fn slot(&self, route: Route) -> &KeySlot {
        match route {
            Route::Production => &self.prime,
            Route::Shadow => &self.shadow,
        }
    }

    /// Map a warrant header kid back to its route. Unknown kids are not a
    /// route.
    pub fn route_for_kid(&self, kid: &str) -> Option<Route> {
        if kid == self.prime.kid {
            Some(Route::Production)
        } else if kid == self.shadow.kid {
            Some(Route::Shadow)
        } else {
            None
        }
    }
}
