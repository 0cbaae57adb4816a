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

//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the quorum protocol and the scoped-execution helper.
///
/// ## Design
/// Fixed backoff with uniform jitter. Every field has a safe default; a
/// coordinator built with `RedlockOptions::default()` behaves sensibly
/// against a three-endpoint quorum set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedlockOptions {
    /// Fraction of the requested duration subtracted as clock-drift
    /// allowance when computing remaining validity.
    pub drift_factor: f64,

    /// Maximum retries after the initial attempt; total attempts are
    /// `retry_count + 1`. A negative value retries without bound.
    pub retry_count: i32,

    /// Nominal backoff between attempts.
    pub retry_delay: Duration,

    /// Uniform jitter range added to (or subtracted from) the backoff.
    pub retry_jitter: Duration,

    /// Used only by the scoped-execution helper: an extension is attempted
    /// when a held lock's remaining validity drops below this.
    pub automatic_extension_threshold: Duration,

    /// Logical database index passed to the lock scripts. Endpoints without
    /// logical databases ignore it.
    pub db: i64,
}

impl Default for RedlockOptions {
    fn default() -> Self {
        Self {
            drift_factor: 0.01,
            retry_count: 10,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(100),
            automatic_extension_threshold: Duration::from_millis(500),
            db: 0,
        }
    }
}
