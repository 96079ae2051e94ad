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

//! Per-session security state.
//!
//! Each session carries a monotonic taint flag and a trailing window of risk
//! events. Within-session operations are serialized by handing out one
//! `tokio::sync::Mutex` per session; the interceptor holds that lock for the
//! whole pipeline of a call, which gives linearizable within-session
//! semantics without a global lock. Cross-session calls proceed in parallel.

use crate::engine_core::constants::session as session_consts;
use crate::engine_core::models::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// One classified call, retained while inside the accumulation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub timestamp: f64,
    pub risk: f64,
    pub tool: String,
}

#[derive(Debug, Default)]
pub struct SessionState {
    tainted: bool,
    taint_source: Option<String>,
    risk_events: VecDeque<RiskEvent>,
    last_seen: f64,
}

impl SessionState {
    /// Monotonic: transitions only false -> true. The first call records the
    /// source; later calls are no-ops.
    pub fn mark_tainted(&mut self, source: &str) {
        if !self.tainted {
            self.tainted = true;
            self.taint_source = Some(source.to_string());
            debug!(source, "session tainted");
        }
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub fn taint_source(&self) -> Option<&str> {
        self.taint_source.as_deref()
    }

    /// Append a risk event, then discard events older than `now - window`.
    pub fn record_risk(&mut self, risk: f64, tool: &str, now: f64, window_secs: f64) {
        self.risk_events.push_back(RiskEvent {
            timestamp: now,
            risk: risk.clamp(0.0, 1.0),
            tool: tool.to_string(),
        });
        while let Some(front) = self.risk_events.front() {
            if now - front.timestamp >= window_secs {
                self.risk_events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Additive-window accumulation: sum of retained risks. Pure function of
    /// current state; does not prune.
    pub fn accumulated_risk(&self, now: f64, window_secs: f64) -> f64 {
        self.risk_events
            .iter()
            .filter(|e| now - e.timestamp < window_secs)
            .map(|e| e.risk)
            .sum()
    }

    pub fn risk_events(&self) -> impl Iterator<Item = &RiskEvent> {
        self.risk_events.iter()
    }
}

pub type SessionHandle = Arc<Mutex<SessionState>>;

/// Keyed store of session handles with time-based idle eviction.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    window_secs: f64,
    idle_ttl_secs: f64,
}

impl SessionStore {
    pub fn new(window_secs: f64, idle_ttl_secs: f64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            window_secs,
            idle_ttl_secs,
        }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Returns the handle for `id`, creating it on first contact. Sweeps
    /// idle sessions as a side effect of the lookup.
    pub async fn touch(&self, id: &SessionId, now: f64) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;

        let idle_ttl = self.idle_ttl_secs;
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(state) => now - state.last_seen < idle_ttl,
            // A locked session is in use; never evict it.
            Err(_) => true,
        });

        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::default())))
            .clone();
        drop(sessions);

        handle.lock().await.last_seen = now;
        handle
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(
            session_consts::DEFAULT_RISK_WINDOW_SECS as f64,
            session_consts::DEFAULT_IDLE_TTL_SECS as f64,
        )
    }
}
