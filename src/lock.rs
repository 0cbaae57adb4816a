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

//! The lock handle returned by a successful acquisition.

use crate::error::{Attempt, RedlockResult};
use crate::options::RedlockOptions;
use crate::redlock::Redlock;
use std::time::Duration;
use tokio::time::Instant;

/// A currently-held distributed lock.
///
/// A handle exists only if the acquisition reached quorum with positive
/// remaining validity. It is owned by the caller: `extend` takes `&mut self`
/// and `release` consumes the handle, so a released lock cannot be reused and
/// concurrent extend/release on one handle is ruled out by the borrow rules.
///
/// The handle remembers the options it was acquired under; later extensions
/// and the release run against the same logical database and drift budget
/// even when they differ from the coordinator's own configuration.
#[derive(Debug)]
pub struct Lock {
    redlock: Redlock,
    resources: Vec<String>,
    value: String,
    attempts: Vec<Attempt>,
    expiration: Instant,
    options: RedlockOptions,
}

impl Lock {
    pub(crate) fn new(
        redlock: Redlock,
        resources: Vec<String>,
        value: String,
        attempts: Vec<Attempt>,
        expiration: Instant,
        options: RedlockOptions,
    ) -> Self {
        Self {
            redlock,
            resources,
            value,
            attempts,
            expiration,
            options,
        }
    }

    /// The ordered resource names this lock covers.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// The ownership token stored at each resource key.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Per-attempt vote summaries from the acquisition, or from the latest
    /// extension.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Monotonic instant beyond which the lock is definitely invalid from
    /// this caller's perspective.
    pub fn expiration(&self) -> Instant {
        self.expiration
    }

    /// Time left in the guaranteed-safe window; zero once expired.
    pub fn remaining_validity(&self) -> Duration {
        self.expiration.saturating_duration_since(Instant::now())
    }

    /// Extend the lock for a fresh duration.
    ///
    /// On success the value is unchanged, the expiration strictly advances,
    /// and the attempt log is replaced with the extension's. On failure the
    /// handle is invalidated (its remaining validity drops to zero) and the
    /// lock must be treated as lost; no implicit release is performed, since
    /// the prior lifetime may already have expired.
    pub async fn extend(&mut self, duration: Duration) -> RedlockResult<()> {
        let redlock = self.redlock.clone();
        let result = redlock
            .extend_lock(&self.resources, &self.value, duration, &self.options)
            .await;
        match result {
            Ok((expiration, attempts)) => {
                self.expiration = expiration;
                self.attempts = attempts;
                Ok(())
            }
            Err(err) => {
                self.expiration = Instant::now();
                Err(err)
            }
        }
    }

    /// Release the lock on every endpoint, consuming the handle.
    ///
    /// Release is best-effort and never requires quorum; it succeeds as long
    /// as at least one endpoint responded, and the returned [`Attempt`]
    /// records every endpoint's outcome for inspection.
    pub async fn release(self) -> RedlockResult<Attempt> {
        self.redlock
            .release_lock(&self.resources, &self.value, &self.options)
            .await
    }
}
