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

//! Error types and per-attempt vote records for distributed lock operations.
//!
//! ## Taxonomy
//! - [`EndpointError`]: a single endpoint's refusal (`ResourceLocked` for
//!   acquire/extend, `ResourceNotHeld` for release) or failure
//!   (`Transport`). These never propagate individually; they accumulate
//!   into [`Attempt`] records.
//! - [`RedlockError`]: what callers see. `InvalidArgument` for rejected
//!   input, `Execution` when the retry window closes without quorum (or a
//!   release reaches no endpoint at all), carrying the full attempt log.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Result type for lock operations.
pub type RedlockResult<T> = Result<T, RedlockError>;

/// Canonical message for a duration that is not a positive whole number of
/// milliseconds.
pub(crate) const INVALID_DURATION: &str = "Duration must be an integer value in milliseconds.";

/// Canonical message for a connection-level endpoint failure.
pub(crate) const CONNECTION_CLOSED: &str = "Connection is closed.";

pub(crate) const NO_RESOURCES: &str = "At least one resource must be provided.";

pub(crate) const NO_ENDPOINTS: &str = "At least one endpoint is required.";

/// A single endpoint's vote against an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The endpoint refused an acquire or extend because at least one
    /// requested key is already held under a different value.
    #[error("The operation was applied to a resource that is already locked.")]
    ResourceLocked,

    /// The endpoint had nothing to remove for at least one requested key:
    /// the key no longer holds this lock value, typically because it
    /// expired or was already released.
    #[error("The operation was applied to a resource that is not held by this lock.")]
    ResourceNotHeld,

    /// The endpoint could not be reached, or answered with a protocol error.
    /// Carries the underlying cause's message.
    #[error("{0}")]
    Transport(String),
}

impl EndpointError {
    /// True for transport-level failures (unreachable endpoint).
    pub fn is_transport(&self) -> bool {
        matches!(self, EndpointError::Transport(_))
    }
}

impl From<redis::RedisError> for EndpointError {
    fn from(err: redis::RedisError) -> Self {
        // Connection-level failures collapse to one canonical message so
        // callers can match on it regardless of the underlying io error.
        if err.is_connection_dropped()
            || err.is_io_error()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            EndpointError::Transport(CONNECTION_CLOSED.to_string())
        } else {
            EndpointError::Transport(err.to_string())
        }
    }
}

/// Per-attempt vote summary, keyed by endpoint identity.
///
/// Votes are aggregated into ordered maps so the record is deterministic by
/// endpoint identity, not by arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempt {
    /// Endpoints that accepted the operation.
    pub votes_for: BTreeSet<String>,
    /// Endpoints that refused or failed, with the reason.
    pub votes_against: BTreeMap<String, EndpointError>,
}

impl Attempt {
    /// Number of endpoints that answered at all (accepted or refused), as
    /// opposed to failing at the transport level.
    pub fn responses(&self) -> usize {
        self.votes_for.len()
            + self
                .votes_against
                .values()
                .filter(|reason| !reason.is_transport())
                .count()
    }

    /// True if any endpoint refused because a resource was already held.
    pub fn is_contended(&self) -> bool {
        self.votes_against
            .values()
            .any(|reason| matches!(reason, EndpointError::ResourceLocked))
    }
}

/// Errors that can occur during lock operations.
#[derive(Error, Debug, Clone)]
pub enum RedlockError {
    /// A caller-supplied argument was rejected before any endpoint was
    /// contacted: non-integer duration, empty resource list, zero endpoints.
    #[error("{0}")]
    InvalidArgument(String),

    /// Failed to establish an endpoint connection at construction time.
    #[error("Failed to connect endpoint {name}: {source}")]
    Connect {
        name: String,
        #[source]
        source: EndpointError,
    },

    /// The operation exhausted its permitted attempts without reaching
    /// quorum, or a release found zero responsive endpoints. Callers
    /// distinguish "contended" from "unreachable" by inspecting the typed
    /// refusals inside `attempts`.
    #[error("The operation was unable to achieve a quorum during its retry window.")]
    Execution { attempts: Vec<Attempt> },
}

impl RedlockError {
    /// The accumulated attempt log, when this error carries one.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            RedlockError::Execution { attempts } => attempts,
            _ => &[],
        }
    }
}
