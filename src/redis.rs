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

//! Redis-backed endpoint implementation.
//!
//! ## Architecture
//! - Uses the `redis` crate with the async `ConnectionManager` (automatic
//!   reconnection), cloned per operation.
//! - Script dispatch goes through [`redis::Script`]: EVALSHA by digest, with
//!   a transparent reload on a "script not found" response.
//! - Connection-level failures are collapsed to the canonical
//!   `"Connection is closed."` transport reason so vote records stay
//!   matchable across io error flavors.

use crate::endpoint::Endpoint;
use crate::error::EndpointError;
use crate::scripts::LockScript;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

/// One Redis server (or cluster shard set) in the quorum set.
pub struct RedisEndpoint {
    /// Vote-record identity; the connection URL by default.
    name: String,
    /// Connection manager (async, pooled, reconnecting).
    manager: ConnectionManager,
}

impl RedisEndpoint {
    /// Connect to a Redis endpoint.
    ///
    /// Example URLs:
    /// - `redis://127.0.0.1:6379/`
    /// - `redis+tls://host:6379/`
    ///
    /// ## Errors
    /// [`EndpointError::Transport`] when the URL does not parse or the
    /// initial connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, EndpointError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            name: url.to_string(),
            manager,
        })
    }

    /// Wrap an existing connection manager under an explicit identity.
    pub fn from_manager(name: impl Into<String>, manager: ConnectionManager) -> Self {
        Self {
            name: name.into(),
            manager,
        }
    }
}

#[async_trait]
impl Endpoint for RedisEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_script(
        &self,
        script: &LockScript,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, EndpointError> {
        let mut conn = self.manager.clone();
        let mut invocation = script.script().prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }

        let reply: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(reply)
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
