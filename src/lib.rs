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

//! # PlexLock Distributed Mutual Exclusion
//!
//! ## Purpose
//! Implements the Redlock algorithm over a set of N *independent* Redis
//! endpoints (not replicas of one another): a lock is held when a majority
//! of endpoints confirms ownership within a bounded monotonic-clock window.
//! Locks can be acquired, extended, and released, and work can be scoped
//! under a lock with background auto-extension.
//!
//! ## Design Decisions
//! - **Quorum voting with partial failures**: per-endpoint refusals and
//!   transport errors never propagate individually; they accumulate into
//!   per-attempt vote records surfaced on exhaustion.
//! - **Drift compensation**: remaining validity subtracts a configurable
//!   fraction of the requested duration plus 2 ms of timer-resolution slack.
//! - **Atomic server-side scripts**: acquire/extend/release each run as one
//!   Lua script per endpoint, invoked by digest with reload-on-miss.
//! - **Crypto-random ownership tokens**: 160 bits from the OS entropy
//!   source; only the token holder may extend or release.
//! - **Cooperative cancellation**: the scoped helper never kills the
//!   routine; it trips an observable safety signal when an extension fails.
//!
//! ## Examples
//!
//! ### Acquire, extend, release
//! ```rust,no_run
//! use plexlock::{Redlock, RedlockOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let redlock = Redlock::connect(
//!     &[
//!         "redis://127.0.0.1:6380/",
//!         "redis://127.0.0.1:6381/",
//!         "redis://127.0.0.1:6382/",
//!     ],
//!     RedlockOptions::default(),
//! )
//! .await?;
//!
//! let mut lock = redlock
//!     .acquire(&["jobs:nightly-report"], Duration::from_secs(30))
//!     .await?;
//!
//! // ... critical section ...
//!
//! lock.extend(Duration::from_secs(30)).await?;
//! lock.release().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Scoped execution with auto-extension
//! ```rust,no_run
//! use plexlock::{Redlock, RedlockOptions};
//! use std::time::Duration;
//!
//! # async fn example(redlock: Redlock) -> Result<(), Box<dyn std::error::Error>> {
//! let processed = redlock
//!     .using(&["{batch-7}queue"], Duration::from_secs(10), |signal| async move {
//!         let mut processed = 0u64;
//!         while !signal.aborted() {
//!             // ... process one unit of work ...
//!             processed += 1;
//!             if processed == 100 {
//!                 break;
//!             }
//!         }
//!         processed
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cluster Notes
//! Endpoints may be sharded clusters, provided every resource of a single
//! lock call hashes to the same shard: use hash-tag braces such as
//! `{group}resourceA` for multi-resource locks.

pub mod endpoint;
pub mod error;
pub mod lock;
pub mod memory;
pub mod options;
pub mod redis;
pub mod redlock;
pub mod scripts;
pub mod using;

pub use endpoint::Endpoint;
pub use error::{Attempt, EndpointError, RedlockError, RedlockResult};
pub use lock::Lock;
pub use memory::MemoryEndpoint;
pub use options::RedlockOptions;
pub use redis::RedisEndpoint;
pub use redlock::Redlock;
pub use using::LockSignal;
