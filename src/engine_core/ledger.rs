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

//! Hash-chained forensic ledger.
//!
//! Append-only JSONL over a single file. Every entry commits to its
//! predecessor: `hash = sha256(canonical_json(entry_without_hash) || prev_hash)`.
//! Truncation or edits break the chain. A single writer is serialized behind
//! a mutex; the last hash is cached after startup so appends do not re-read
//! the file.

use crate::engine_core::constants::ledger as ledger_consts;
use crate::engine_core::errors::GatewayError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ToolCall,
    TaintMarked,
    PolicyFallback,
    SessionStart,
}

/// Hash-less body. Field order here is the canonical serialization order;
/// verification recomputes over the same struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryBody {
    event_id: String,
    prev_hash: String,
    timestamp: String,
    session_id: String,
    event_type: EventType,
    trigger: String,
    action: String,
    outcome: String,
    accumulated_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub event_id: String,
    pub prev_hash: String,
    pub timestamp: String,
    pub session_id: String,
    pub event_type: EventType,
    pub trigger: String,
    pub action: String,
    pub outcome: String,
    pub accumulated_risk: f64,
    pub hash: String,
}

impl LedgerEntry {
    fn body(&self) -> EntryBody {
        EntryBody {
            event_id: self.event_id.clone(),
            prev_hash: self.prev_hash.clone(),
            timestamp: self.timestamp.clone(),
            session_id: self.session_id.clone(),
            event_type: self.event_type,
            trigger: self.trigger.clone(),
            action: self.action.clone(),
            outcome: self.outcome.clone(),
            accumulated_risk: self.accumulated_risk,
        }
    }
}

/// What the interceptor hands over per decision; ids, timestamps, and chain
/// linkage are filled in by the ledger.
#[derive(Debug, Clone)]
pub struct LedgerDraft {
    pub session_id: String,
    pub event_type: EventType,
    pub trigger: String,
    pub action: String,
    pub outcome: String,
    pub accumulated_risk: f64,
}

struct LedgerInner {
    file: File,
    last_hash: String,
    pending: Vec<LedgerDraft>,
    consecutive_failures: u32,
}

pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

fn chain_hash(body_json: &str, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body_json.as_bytes());
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

impl Ledger {
    /// Open (or create) the ledger file and recover the chain tip from the
    /// last line, if any.
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let last_hash = match File::open(path) {
            Ok(existing) => {
                let mut tip = ledger_consts::GENESIS_PREV_HASH.to_string();
                for line in BufReader::new(existing).lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let entry: LedgerEntry = serde_json::from_str(&line)
                        .map_err(|e| GatewayError::LedgerWrite(format!("corrupt tail: {e}")))?;
                    tip = entry.hash;
                }
                tip
            }
            Err(_) => ledger_consts::GENESIS_PREV_HASH.to_string(),
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Mutex::new(LedgerInner {
                file,
                last_hash,
                pending: Vec::new(),
                consecutive_failures: 0,
            }),
        })
    }

    /// Append one entry. Routing must not hinge on logging: on write failure
    /// the draft is queued for retry and the call proceeds.
    pub fn append(&self, draft: LedgerDraft) -> Result<LedgerEntry, GatewayError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| GatewayError::LedgerWrite("writer mutex poisoned".to_string()))?;

        // Drain any previously queued drafts first so file order matches
        // decision order as closely as the retry model allows.
        let queued: Vec<LedgerDraft> = inner.pending.drain(..).collect();
        for q in queued {
            if let Err(e) = Self::write_one(&mut inner, q.clone()) {
                warn!("ledger retry failed: {e}");
                inner.pending.push(q);
            }
        }

        match Self::write_one(&mut inner, draft.clone()) {
            Ok(entry) => {
                inner.consecutive_failures = 0;
                Ok(entry)
            }
            Err(e) => {
                inner.pending.push(draft);
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= ledger_consts::WRITE_FAILURE_LIMIT {
                    error!(
                        failures = inner.consecutive_failures,
                        "ledger writes failing repeatedly; escalate to shutdown"
                    );
                }
                Err(e)
            }
        }
    }

    fn write_one(inner: &mut LedgerInner, draft: LedgerDraft) -> Result<LedgerEntry, GatewayError> {
        let body = EntryBody {
            event_id: Uuid::new_v4().to_string(),
            prev_hash: inner.last_hash.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: draft.session_id,
            event_type: draft.event_type,
            trigger: draft.trigger,
            action: draft.action,
            outcome: draft.outcome,
            accumulated_risk: draft.accumulated_risk,
        };

        let body_json = serde_json::to_string(&body)?;
        let hash = chain_hash(&body_json, &body.prev_hash);
        let entry = LedgerEntry {
            event_id: body.event_id,
            prev_hash: body.prev_hash,
            timestamp: body.timestamp,
            session_id: body.session_id,
            event_type: body.event_type,
            trigger: body.trigger,
            action: body.action,
            outcome: body.outcome,
            accumulated_risk: body.accumulated_risk,
            hash,
        };

        let line = serde_json::to_string(&entry)?;
        writeln!(inner.file, "{line}").map_err(|e| GatewayError::LedgerWrite(e.to_string()))?;
        inner
            .file
            .flush()
            .map_err(|e| GatewayError::LedgerWrite(e.to_string()))?;

        inner.last_hash = entry.hash.clone();
        Ok(entry)
    }

    /// Drafts still queued after repeated write failures; reported at shutdown.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().map(|i| i.pending.len()).unwrap_or(0)
    }
}

/// Recompute the chain from the genesis constant. Returns the number of
/// verified entries; any broken link or recomputed-hash mismatch is an error.
pub fn verify_chain(path: &Path) -> Result<usize, GatewayError> {
    let file = File::open(path)?;
    let mut expected_prev = ledger_consts::GENESIS_PREV_HASH.to_string();
    let mut count = 0usize;

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LedgerEntry = serde_json::from_str(&line)?;

        if entry.prev_hash != expected_prev {
            return Err(GatewayError::LedgerWrite(format!(
                "chain break at entry {count}: prev_hash mismatch"
            )));
        }
        let body_json = serde_json::to_string(&entry.body())?;
        let recomputed = chain_hash(&body_json, &entry.prev_hash);
        if recomputed != entry.hash {
            return Err(GatewayError::LedgerWrite(format!(
                "chain break at entry {count}: hash mismatch"
            )));
        }
        expected_prev = entry.hash;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(session: &str, action: &str) -> LedgerDraft {
        LedgerDraft {
            session_id: session.to_string(),
            event_type: EventType::ToolCall,
            trigger: "read_file".to_string(),
            action: action.to_string(),
            outcome: "ok".to_string(),
            accumulated_risk: 0.4,
        }
    }

    #[test]
    fn appends_link_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = Ledger::open(&path).unwrap();
        let first = ledger.append(draft("s1", "production")).unwrap();
        let second = ledger.append(draft("s1", "shadow")).unwrap();

        assert_eq!(first.prev_hash, ledger_consts::GENESIS_PREV_HASH);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn reopen_recovers_chain_tip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let tip = {
            let ledger = Ledger::open(&path).unwrap();
            ledger.append(draft("s1", "production")).unwrap().hash
        };

        let ledger = Ledger::open(&path).unwrap();
        let next = ledger.append(draft("s1", "shadow")).unwrap();
        assert_eq!(next.prev_hash, tip);
        assert_eq!(verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn tampering_breaks_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = Ledger::open(&path).unwrap();
        ledger.append(draft("s1", "production")).unwrap();
        ledger.append(draft("s1", "shadow")).unwrap();
        drop(ledger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let tampered = contents.replace("\"shadow\"", "\"production\"");
        assert_ne!(contents, tampered);
        std::fs::write(&path, tampered).unwrap();

        assert!(verify_chain(&path).is_err());
    }
}
