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

//! The endpoint contract consumed by the coordinator.

use crate::error::EndpointError;
use crate::scripts::LockScript;
use async_trait::async_trait;

/// One independent key-value server participating in the quorum set.
///
/// ## Contract
/// An endpoint must be able to execute a [`LockScript`] atomically with
/// respect to other commands it serves, and return the script's integer
/// reply. Endpoints are independent of one another; the coordinator never
/// assumes replication between them.
///
/// The coordinator is agnostic to whether an endpoint is a single instance
/// or a sharded cluster, provided all keys of a single call hash to the same
/// shard (use hash-tag braces, e.g. `{group}resource`, for multi-resource
/// locks on a cluster).
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Stable identity used to key per-attempt vote records; typically the
    /// connection URL.
    fn name(&self) -> &str;

    /// Execute one of the lock scripts with the given keys and arguments,
    /// returning its integer reply.
    ///
    /// ## Errors
    /// - [`EndpointError::Transport`]: the endpoint was unreachable or
    ///   answered with a protocol error. Refusals are *not* errors; they
    ///   come back as the script's integer reply.
    async fn run_script(
        &self,
        script: &LockScript,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, EndpointError>;

    /// Liveness check.
    async fn ping(&self) -> Result<(), EndpointError>;
}
