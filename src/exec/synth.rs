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

//! Deterministic record synthesis.
//!
//! Every derived value is a pure function of `(collection, id, field)`, so
//! the same id maps to the same fake record across processes and sessions.
//! Persistence in the shadow store is an optimization on top of this, not
//! the source of stability.

use crate::exec::scenario::{CollectionSpec, FieldSpec};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

const FIRST_NAMES: [&str; 16] = [
    "Maya", "Jonas", "Priya", "Viktor", "Amara", "Tomas", "Ingrid", "Rafael", "Keiko", "Dmitri",
    "Leila", "Oscar", "Hana", "Marcus", "Elif", "Stefan",
];

const LAST_NAMES: [&str; 16] = [
    "Halvorsen", "Okafor", "Lindqvist", "Marchetti", "Tanaka", "Novak", "Beaumont", "Castillo",
    "Virtanen", "Adeyemi", "Kowalski", "Petrov", "Sandoval", "Takahashi", "Moreau", "Eriksen",
];

/// Canonical id rendering so `100` and `"100"` seed the same record.
pub fn canonical_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn seed_u64(collection: &str, id: &str, field: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(field.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 yields 32 bytes"))
}

fn synth_field(collection: &str, id: &Value, field: &str, spec: &FieldSpec) -> Value {
    let id_str = canonical_id(id);
    let seed = seed_u64(collection, &id_str, field);

    match spec {
        FieldSpec::Id => id.clone(),
        FieldSpec::Fixed { value } => value.clone(),
        FieldSpec::Choice { options } => {
            if options.is_empty() {
                Value::Null
            } else {
                options[(seed % options.len() as u64) as usize].clone()
            }
        }
        FieldSpec::Name => {
            let first = FIRST_NAMES[(seed % FIRST_NAMES.len() as u64) as usize];
            let last = LAST_NAMES[((seed >> 16) % LAST_NAMES.len() as u64) as usize];
            json!(format!("{first} {last}"))
        }
        FieldSpec::Number { min, max, integer } => {
            let span = (max - min).max(0.0);
            let fraction = (seed % 10_000) as f64 / 10_000.0;
            let value = min + span * fraction;
            if *integer {
                json!(value.round() as i64)
            } else {
                json!((value * 100.0).round() / 100.0)
            }
        }
        FieldSpec::Token { prefix } => {
            json!(format!("{prefix}{:08x}", (seed & 0xffff_ffff) as u32))
        }
    }
}

/// Fabricate a full record for an id the shadow store has never seen.
pub fn synthesize_record(collection: &str, spec: &CollectionSpec, id: &Value) -> Value {
    let mut record = serde_json::Map::new();
    for (field, field_spec) in &spec.fields {
        record.insert(
            field.clone(),
            synth_field(collection, id, field, field_spec),
        );
    }
    Value::Object(record)
}

/// Fabricate plausible file content for a path missing under the shadow
/// root. Deterministic per path.
pub fn synthesize_file(path: &str) -> String {
    let seed = seed_u64("fs", path, "content");
    let owner = FIRST_NAMES[(seed % FIRST_NAMES.len() as u64) as usize];
    let revision = (seed >> 8) % 90 + 10;
    let token = format!("{:016x}", seed);
    format!(
        "{{\"document\": \"{path}\", \"revision\": {revision}, \"owner\": \"{owner}\", \"checksum\": \"{token}\", \"status\": \"archived\"}}\n"
    )
}
