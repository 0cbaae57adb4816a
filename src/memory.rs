// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexLock.
//
// PlexLock is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexLock is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexLock. If not, see <https://www.gnu.org/licenses/>.

//! In-memory endpoint implementation (for testing).
//!
//! ## Purpose
//! Emulates the three lock scripts over a per-database keyspace map so the
//! quorum protocol can be exercised without a live server, including
//! fault-injection via an offline toggle.
//!
//! ## Limitations
//! - Not persistent, not distributed (single process only).
//! - Expiry is lazy: expired entries linger until the next script touches
//!   them.

use crate::endpoint::Endpoint;
use crate::error::{EndpointError, CONNECTION_CLOSED};
use crate::scripts::LockScript;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory endpoint (for testing).
pub struct MemoryEndpoint {
    name: String,
    offline: AtomicBool,
    /// Logical database index -> key -> entry.
    keyspaces: Mutex<HashMap<i64, HashMap<String, Entry>>>,
}

impl MemoryEndpoint {
    /// Create a new in-memory endpoint under the given vote-record identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offline: AtomicBool::new(false),
            keyspaces: Mutex::new(HashMap::new()),
        }
    }

    /// Simulate the endpoint becoming unreachable (or reachable again).
    /// While offline, every call fails with the canonical transport reason.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current value of a key, if present and unexpired.
    pub async fn value_of(&self, db: i64, key: &str) -> Option<String> {
        let keyspaces = self.keyspaces.lock().await;
        let now = Instant::now();
        keyspaces
            .get(&db)
            .and_then(|space| space.get(key))
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remaining time-to-live of a key, if present and unexpired.
    pub async fn pttl(&self, db: i64, key: &str) -> Option<Duration> {
        let keyspaces = self.keyspaces.lock().await;
        let now = Instant::now();
        keyspaces
            .get(&db)
            .and_then(|space| space.get(key))
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at.duration_since(now))
    }

    fn parse_millis(raw: &str) -> Result<u64, EndpointError> {
        raw.parse::<u64>()
            .map_err(|err| EndpointError::Transport(format!("invalid TTL argument {raw}: {err}")))
    }

    fn parse_db(raw: &str) -> Result<i64, EndpointError> {
        raw.parse::<i64>()
            .map_err(|err| EndpointError::Transport(format!("invalid db argument {raw}: {err}")))
    }
}

#[async_trait]
impl Endpoint for MemoryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_script(
        &self,
        script: &LockScript,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, EndpointError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EndpointError::Transport(CONNECTION_CLOSED.to_string()));
        }

        let mut keyspaces = self.keyspaces.lock().await;
        let now = Instant::now();

        match script.name() {
            "acquire" => {
                let (value, ttl, db) = match args {
                    [value, ttl, db] => (value, Self::parse_millis(ttl)?, Self::parse_db(db)?),
                    _ => {
                        return Err(EndpointError::Transport(format!(
                            "acquire expects 3 arguments, got {}",
                            args.len()
                        )))
                    }
                };
                let space = keyspaces.entry(db).or_default();
                space.retain(|_, entry| !entry.is_expired(now));
                if keys.iter().any(|key| space.contains_key(key)) {
                    return Ok(0);
                }
                for key in keys {
                    space.insert(
                        key.clone(),
                        Entry {
                            value: value.clone(),
                            expires_at: now + Duration::from_millis(ttl),
                        },
                    );
                }
                Ok(keys.len() as i64)
            }
            "extend" => {
                let (value, ttl, db) = match args {
                    [value, ttl, db] => (value, Self::parse_millis(ttl)?, Self::parse_db(db)?),
                    _ => {
                        return Err(EndpointError::Transport(format!(
                            "extend expects 3 arguments, got {}",
                            args.len()
                        )))
                    }
                };
                let space = keyspaces.entry(db).or_default();
                space.retain(|_, entry| !entry.is_expired(now));
                let held = keys
                    .iter()
                    .all(|key| space.get(key).is_some_and(|entry| &entry.value == value));
                if !held {
                    return Ok(0);
                }
                for key in keys {
                    space.insert(
                        key.clone(),
                        Entry {
                            value: value.clone(),
                            expires_at: now + Duration::from_millis(ttl),
                        },
                    );
                }
                Ok(keys.len() as i64)
            }
            "release" => {
                let (value, db) = match args {
                    [value, db] => (value, Self::parse_db(db)?),
                    _ => {
                        return Err(EndpointError::Transport(format!(
                            "release expects 2 arguments, got {}",
                            args.len()
                        )))
                    }
                };
                let space = keyspaces.entry(db).or_default();
                space.retain(|_, entry| !entry.is_expired(now));
                let mut removed = 0;
                for key in keys {
                    if space.get(key).is_some_and(|entry| &entry.value == value) {
                        space.remove(key);
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            other => Err(EndpointError::Transport(format!(
                "unknown lock script: {other}"
            ))),
        }
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EndpointError::Transport(CONNECTION_CLOSED.to_string()));
        }
        Ok(())
    }
}
