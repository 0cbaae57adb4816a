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

//! The quorum coordinator.
//!
//! ## Purpose
//! Runs the Redlock protocol over N independent endpoints: concurrent script
//! dispatch, majority voting, drift-compensated validity accounting, retries
//! with jittered backoff, and best-effort cleanup of failed attempts.
//!
//! ## Design
//! - Endpoint calls within one attempt are all dispatched before any is
//!   awaited, and the attempt completes only when all have settled.
//! - Per-endpoint failures never propagate individually; they accumulate
//!   into [`Attempt`] records and surface only at attempt exhaustion.
//! - All elapsed-time arithmetic uses a monotonic clock; lock values come
//!   from the operating system's entropy source.

use crate::endpoint::Endpoint;
use crate::error::{
    Attempt, EndpointError, RedlockError, RedlockResult, INVALID_DURATION, NO_ENDPOINTS,
    NO_RESOURCES,
};
use crate::lock::Lock;
use crate::options::RedlockOptions;
use crate::redis::RedisEndpoint;
use crate::scripts::{LockScript, ACQUIRE_SCRIPT, EXTEND_SCRIPT, RELEASE_SCRIPT};
use futures::future::join_all;
use rand::{rngs::OsRng, Rng, RngCore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Distributed mutual-exclusion coordinator over a quorum set of endpoints.
///
/// Cloning is cheap (the endpoint set is shared); every lock handle carries a
/// clone so `extend` and `release` re-enter the same coordinator.
#[derive(Clone)]
pub struct Redlock {
    endpoints: Arc<Vec<Arc<dyn Endpoint>>>,
    options: RedlockOptions,
}

impl std::fmt::Debug for Redlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redlock")
            .field(
                "endpoints",
                &self.endpoints.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl Redlock {
    /// Create a coordinator over the given endpoints.
    ///
    /// ## Errors
    /// [`RedlockError::InvalidArgument`] if the endpoint set is empty.
    pub fn new(
        endpoints: Vec<Arc<dyn Endpoint>>,
        options: RedlockOptions,
    ) -> RedlockResult<Self> {
        if endpoints.is_empty() {
            return Err(RedlockError::InvalidArgument(NO_ENDPOINTS.to_string()));
        }
        Ok(Self {
            endpoints: Arc::new(endpoints),
            options,
        })
    }

    /// Connect to a set of Redis endpoints and build a coordinator over
    /// them. Fails fast if any endpoint cannot be reached.
    pub async fn connect<S: AsRef<str>>(
        urls: &[S],
        options: RedlockOptions,
    ) -> RedlockResult<Self> {
        let mut endpoints: Vec<Arc<dyn Endpoint>> = Vec::with_capacity(urls.len());
        for url in urls {
            let url = url.as_ref();
            let endpoint =
                RedisEndpoint::connect(url)
                    .await
                    .map_err(|source| RedlockError::Connect {
                        name: url.to_string(),
                        source,
                    })?;
            endpoints.push(Arc::new(endpoint));
        }
        Self::new(endpoints, options)
    }

    /// The coordinator's configured options.
    pub fn options(&self) -> &RedlockOptions {
        &self.options
    }

    /// Majority threshold for the current endpoint set.
    pub fn quorum(&self) -> usize {
        self.endpoints.len() / 2 + 1
    }

    /// Acquire a lock on `resources` for `duration`, using the
    /// coordinator's options.
    pub async fn acquire(&self, resources: &[&str], duration: Duration) -> RedlockResult<Lock> {
        self.acquire_with_options(resources, duration, self.options.clone())
            .await
    }

    /// Acquire a lock with per-call options.
    ///
    /// ## Behavior
    /// Generates a fresh random value, then runs up to `retry_count + 1`
    /// attempts. Each attempt dispatches the acquire script to every
    /// endpoint concurrently, counts votes, and validates that the
    /// drift-compensated remaining validity is positive. Attempts that miss
    /// quorum are rolled back everywhere, best-effort, before the jittered
    /// backoff.
    ///
    /// ## Errors
    /// - [`RedlockError::InvalidArgument`]: empty resource list, or a
    ///   duration that is not a positive whole number of milliseconds.
    /// - [`RedlockError::Execution`]: attempts exhausted without quorum;
    ///   carries the full attempt log.
    pub async fn acquire_with_options(
        &self,
        resources: &[&str],
        duration: Duration,
        options: RedlockOptions,
    ) -> RedlockResult<Lock> {
        if resources.is_empty() {
            return Err(RedlockError::InvalidArgument(NO_RESOURCES.to_string()));
        }
        let ttl_ms = whole_milliseconds(duration)?;
        let keys: Vec<String> = resources.iter().map(|r| r.to_string()).collect();
        let value = random_value();

        let (expiration, attempts) = self
            .execute(&ACQUIRE_SCRIPT, &keys, &value, ttl_ms, &options, true)
            .await?;
        Ok(Lock::new(
            self.clone(),
            keys,
            value,
            attempts,
            expiration,
            options,
        ))
    }

    /// Re-arm an existing lock for a fresh duration, under the options the
    /// lock was acquired with. Same retry and quorum structure as
    /// acquisition, but failed attempts are not rolled back: the keys may
    /// still be legitimately held until their prior expiry.
    pub(crate) async fn extend_lock(
        &self,
        resources: &[String],
        value: &str,
        duration: Duration,
        options: &RedlockOptions,
    ) -> RedlockResult<(Instant, Vec<Attempt>)> {
        let ttl_ms = whole_milliseconds(duration)?;
        self.execute(&EXTEND_SCRIPT, resources, value, ttl_ms, options, false)
            .await
    }

    /// Release a lock on every endpoint.
    ///
    /// Release never requires quorum: it is always attempted everywhere so
    /// stale minority holders expire cleanly. It fails only when not a
    /// single endpoint responded; partial rejection is still success, and
    /// the returned record preserves every endpoint's outcome.
    pub(crate) async fn release_lock(
        &self,
        resources: &[String],
        value: &str,
        options: &RedlockOptions,
    ) -> RedlockResult<Attempt> {
        let args = vec![value.to_string(), options.db.to_string()];
        let attempt = self.collect_votes(&RELEASE_SCRIPT, resources, &args).await;

        if attempt.responses() == 0 {
            return Err(RedlockError::Execution {
                attempts: vec![attempt],
            });
        }
        debug!(
            released = attempt.votes_for.len(),
            rejected = attempt.votes_against.len(),
            "released lock"
        );
        Ok(attempt)
    }

    /// Check the liveness of every endpoint concurrently, returning the
    /// per-endpoint outcomes as a vote record.
    pub async fn ping(&self) -> Attempt {
        let checks = self.endpoints.iter().map(|endpoint| async move {
            let outcome = endpoint.ping().await;
            (endpoint.name().to_string(), outcome)
        });

        let mut attempt = Attempt::default();
        for (name, outcome) in join_all(checks).await {
            match outcome {
                Ok(()) => {
                    attempt.votes_for.insert(name);
                }
                Err(err) => {
                    attempt.votes_against.insert(name, err);
                }
            }
        }
        attempt
    }

    /// The shared retry loop behind acquire and extend.
    async fn execute(
        &self,
        script: &LockScript,
        keys: &[String],
        value: &str,
        ttl_ms: u64,
        options: &RedlockOptions,
        cleanup_on_failure: bool,
    ) -> RedlockResult<(Instant, Vec<Attempt>)> {
        let quorum = self.quorum();
        let drift = drift_budget_ms(options.drift_factor, ttl_ms);
        let args = vec![
            value.to_string(),
            ttl_ms.to_string(),
            options.db.to_string(),
        ];
        let mut attempts: Vec<Attempt> = Vec::new();

        loop {
            let started = Instant::now();
            let attempt = self.collect_votes(script, keys, &args).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let remaining_ms = ttl_ms.saturating_sub(elapsed_ms).saturating_sub(drift);

            if attempt.votes_for.len() >= quorum && remaining_ms > 0 {
                let expiration = started + Duration::from_millis(ttl_ms - drift);
                debug!(
                    op = script.name(),
                    votes = attempt.votes_for.len(),
                    quorum,
                    remaining_ms,
                    "quorum reached"
                );
                attempts.push(attempt);
                return Ok((expiration, attempts));
            }

            if cleanup_on_failure {
                // Roll back minority writes so they do not strand resources
                // until their expiry.
                let release_args = vec![value.to_string(), options.db.to_string()];
                let rollback = self.collect_votes(&RELEASE_SCRIPT, keys, &release_args).await;
                debug!(
                    cleared = rollback.votes_for.len(),
                    "rolled back failed attempt"
                );
            }

            debug!(
                op = script.name(),
                votes = attempt.votes_for.len(),
                quorum,
                attempt = attempts.len() + 1,
                "quorum missed"
            );
            attempts.push(attempt);

            if options.retry_count >= 0 && attempts.len() > options.retry_count as usize {
                return Err(RedlockError::Execution { attempts });
            }
            tokio::time::sleep(retry_pause(options)).await;
        }
    }

    /// Dispatch a script to every endpoint concurrently and aggregate the
    /// settled outcomes into a vote record. A reply matching the full key
    /// count is a vote for; any lesser reply is a refusal; an error is a
    /// transport vote against.
    ///
    /// The refusal reason depends on the operation: an acquire or extend is
    /// refused because a resource is already locked, while a release that
    /// removed fewer entries than requested found resources no longer held
    /// under this lock value (expiry is a legitimate cause, not contention).
    async fn collect_votes(
        &self,
        script: &LockScript,
        keys: &[String],
        args: &[String],
    ) -> Attempt {
        let expected = keys.len() as i64;
        let refusal = if script.name() == RELEASE_SCRIPT.name() {
            EndpointError::ResourceNotHeld
        } else {
            EndpointError::ResourceLocked
        };
        let calls = self.endpoints.iter().map(|endpoint| async move {
            let outcome = endpoint.run_script(script, keys, args).await;
            (endpoint.name().to_string(), outcome)
        });

        let mut attempt = Attempt::default();
        for (name, outcome) in join_all(calls).await {
            match outcome {
                Ok(reply) if reply == expected => {
                    attempt.votes_for.insert(name);
                }
                Ok(_) => {
                    attempt.votes_against.insert(name, refusal.clone());
                }
                Err(err) => {
                    attempt.votes_against.insert(name, err);
                }
            }
        }
        attempt
    }
}

/// Validate that a duration is a strictly positive whole number of
/// milliseconds, and return that number.
fn whole_milliseconds(duration: Duration) -> RedlockResult<u64> {
    if duration.is_zero() || duration.subsec_nanos() % 1_000_000 != 0 {
        return Err(RedlockError::InvalidArgument(INVALID_DURATION.to_string()));
    }
    u64::try_from(duration.as_millis())
        .map_err(|_| RedlockError::InvalidArgument(INVALID_DURATION.to_string()))
}

/// Clock-drift allowance: a fraction of the requested duration plus 2 ms for
/// timer resolution.
fn drift_budget_ms(drift_factor: f64, ttl_ms: u64) -> u64 {
    (drift_factor * ttl_ms as f64).floor() as u64 + 2
}

/// Backoff for the next attempt: the nominal delay plus uniform jitter,
/// clamped at zero.
fn retry_pause(options: &RedlockOptions) -> Duration {
    let delay = options.retry_delay.as_millis() as i64;
    let jitter = options.retry_jitter.as_millis() as i64;
    let offset = if jitter > 0 {
        rand::thread_rng().gen_range(-jitter..=jitter)
    } else {
        0
    };
    Duration::from_millis(delay.saturating_add(offset).max(0) as u64)
}

/// A fresh ownership token: 160 bits from the OS entropy source,
/// hex-encoded.
fn random_value() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEndpoint;

    fn fast_options() -> RedlockOptions {
        RedlockOptions {
            retry_count: 2,
            retry_delay: Duration::from_millis(5),
            retry_jitter: Duration::from_millis(0),
            ..RedlockOptions::default()
        }
    }

    fn cluster(size: usize) -> (Vec<Arc<MemoryEndpoint>>, Redlock) {
        let endpoints: Vec<Arc<MemoryEndpoint>> = (0..size)
            .map(|i| Arc::new(MemoryEndpoint::new(format!("mem-{i}"))))
            .collect();
        let dyn_endpoints: Vec<Arc<dyn Endpoint>> = endpoints
            .iter()
            .map(|e| e.clone() as Arc<dyn Endpoint>)
            .collect();
        let redlock = Redlock::new(dyn_endpoints, fast_options()).unwrap();
        (endpoints, redlock)
    }

    #[test]
    fn test_quorum_is_majority() {
        let (_, one) = cluster(1);
        let (_, two) = cluster(2);
        let (_, three) = cluster(3);
        let (_, five) = cluster(5);
        assert_eq!(one.quorum(), 1);
        assert_eq!(two.quorum(), 2);
        assert_eq!(three.quorum(), 2);
        assert_eq!(five.quorum(), 3);
    }

    #[test]
    fn test_new_rejects_empty_endpoint_set() {
        let result = Redlock::new(Vec::new(), RedlockOptions::default());
        assert!(matches!(result, Err(RedlockError::InvalidArgument(_))));
    }

    #[test]
    fn test_duration_guard() {
        assert_eq!(whole_milliseconds(Duration::from_millis(200)).unwrap(), 200);
        assert_eq!(
            whole_milliseconds(Duration::from_millis(900_000_000)).unwrap(),
            900_000_000
        );

        for bad in [Duration::ZERO, Duration::from_nanos(1_500_000)] {
            let err = whole_milliseconds(bad).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Duration must be an integer value in milliseconds."
            );
        }
    }

    #[test]
    fn test_drift_budget() {
        assert_eq!(drift_budget_ms(0.01, 200), 4);
        assert_eq!(drift_budget_ms(0.01, 900_000_000), 9_000_002);
        assert_eq!(drift_budget_ms(0.0, 1_000), 2);
    }

    #[test]
    fn test_random_values_are_long_and_unique() {
        let a = random_value();
        let b = random_value();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_acquire_writes_every_endpoint() {
        let (endpoints, redlock) = cluster(3);
        let lock = redlock
            .acquire(&["{r}a"], Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(lock.attempts().len(), 1);
        assert_eq!(lock.attempts()[0].votes_for.len(), 3);
        assert!(lock.remaining_validity() > Duration::ZERO);
        for endpoint in &endpoints {
            assert_eq!(
                endpoint.value_of(0, "{r}a").await.as_deref(),
                Some(lock.value())
            );
        }
    }

    #[tokio::test]
    async fn test_acquire_rejects_empty_resources() {
        let (_, redlock) = cluster(3);
        let result = redlock.acquire(&[], Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RedlockError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_acquire_rejects_fractional_milliseconds() {
        let (_, redlock) = cluster(3);
        let err = redlock
            .acquire(&["{r}f"], Duration::from_nanos(1_500_000))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duration must be an integer value in milliseconds."
        );
    }

    #[tokio::test]
    async fn test_contended_acquire_exhausts_attempts() {
        let (endpoints, redlock) = cluster(3);
        let holder = redlock
            .acquire(&["{r}c"], Duration::from_secs(30))
            .await
            .unwrap();

        let err = redlock
            .acquire(&["{r}c"], Duration::from_secs(30))
            .await
            .unwrap_err();

        // retry_count 2 -> 3 attempts, every vote against a refusal.
        let attempts = err.attempts();
        assert_eq!(attempts.len(), 3);
        for attempt in attempts {
            assert!(attempt.votes_for.is_empty());
            assert_eq!(attempt.votes_against.len(), 3);
            assert!(attempt
                .votes_against
                .values()
                .all(|reason| *reason == EndpointError::ResourceLocked));
        }

        // The holder's entries were untouched by the failed attempts.
        for endpoint in &endpoints {
            assert_eq!(
                endpoint.value_of(0, "{r}c").await.as_deref(),
                Some(holder.value())
            );
        }
    }

    #[tokio::test]
    async fn test_acquire_with_minority_offline_succeeds() {
        let (endpoints, redlock) = cluster(3);
        endpoints[2].set_offline(true);

        let lock = redlock
            .acquire(&["{r}m"], Duration::from_secs(5))
            .await
            .unwrap();

        let attempt = &lock.attempts()[0];
        assert_eq!(attempt.votes_for.len(), 2);
        assert_eq!(
            attempt.votes_against.get("mem-2").map(|e| e.to_string()),
            Some("Connection is closed.".to_string())
        );
    }

    #[tokio::test]
    async fn test_acquire_with_majority_offline_fails_and_rolls_back() {
        let (endpoints, redlock) = cluster(3);
        endpoints[1].set_offline(true);
        endpoints[2].set_offline(true);

        let err = redlock
            .acquire(&["{r}b"], Duration::from_secs(5))
            .await
            .unwrap_err();

        let attempts = err.attempts();
        assert_eq!(attempts.len(), 3);
        for attempt in attempts {
            assert_eq!(attempt.votes_for.len(), 1);
            assert!(attempt
                .votes_against
                .values()
                .all(|reason| reason.to_string() == "Connection is closed."));
        }

        // The reachable minority vote was rolled back between attempts.
        assert_eq!(endpoints[0].value_of(0, "{r}b").await, None);
    }

    #[tokio::test]
    async fn test_overlapping_acquire_leaves_holder_intact() {
        let (endpoints, redlock) = cluster(3);
        let holder = redlock
            .acquire(&["{r}c1", "{r}c2"], Duration::from_secs(30))
            .await
            .unwrap();

        let err = redlock
            .acquire(&["{r}c2", "{r}c3"], Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(!err.attempts().is_empty());

        for endpoint in &endpoints {
            assert_eq!(
                endpoint.value_of(0, "{r}c1").await.as_deref(),
                Some(holder.value())
            );
            assert_eq!(
                endpoint.value_of(0, "{r}c2").await.as_deref(),
                Some(holder.value())
            );
            assert_eq!(endpoint.value_of(0, "{r}c3").await, None);
        }
    }

    #[tokio::test]
    async fn test_expired_lock_is_reacquirable() {
        let (_, redlock) = cluster(3);
        let first = redlock
            .acquire(&["{r}d"], Duration::from_millis(200))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        let second = redlock
            .acquire(&["{r}d"], Duration::from_millis(200))
            .await
            .unwrap();
        assert_ne!(first.value(), second.value());
    }

    #[tokio::test]
    async fn test_release_clears_keys_and_allows_reacquire() {
        let (endpoints, redlock) = cluster(3);
        let lock = redlock
            .acquire(&["{r}a1", "{r}a2"], Duration::from_secs(30))
            .await
            .unwrap();

        let record = lock.release().await.unwrap();
        assert_eq!(record.votes_for.len(), 3);
        for endpoint in &endpoints {
            assert_eq!(endpoint.value_of(0, "{r}a1").await, None);
            assert_eq!(endpoint.value_of(0, "{r}a2").await, None);
        }

        redlock
            .acquire(&["{r}a1"], Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_with_all_endpoints_offline_errors() {
        let (endpoints, redlock) = cluster(3);
        let lock = redlock
            .acquire(&["{r}z"], Duration::from_secs(5))
            .await
            .unwrap();

        for endpoint in &endpoints {
            endpoint.set_offline(true);
        }
        let err = lock.release().await.unwrap_err();
        assert!(matches!(err, RedlockError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_release_with_partial_transport_failure_succeeds() {
        let (endpoints, redlock) = cluster(3);
        let lock = redlock
            .acquire(&["{r}p"], Duration::from_secs(5))
            .await
            .unwrap();

        endpoints[0].set_offline(true);
        let record = lock.release().await.unwrap();
        assert_eq!(record.votes_for.len(), 2);
        assert!(record.votes_against.get("mem-0").is_some_and(|e| e.is_transport()));
        assert_eq!(endpoints[1].value_of(0, "{r}p").await, None);
    }

    #[tokio::test]
    async fn test_release_after_expiry_reports_not_held() {
        let (_, redlock) = cluster(3);
        let lock = redlock
            .acquire(&["{r}n"], Duration::from_millis(200))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        // Every endpoint answered, so the release succeeds, and the refusals
        // must say "not held" rather than claim contention.
        let record = lock.release().await.unwrap();
        assert!(record.votes_for.is_empty());
        assert_eq!(record.votes_against.len(), 3);
        assert!(record
            .votes_against
            .values()
            .all(|reason| *reason == EndpointError::ResourceNotHeld));
    }

    #[tokio::test]
    async fn test_per_call_options_follow_the_lock() {
        // Coordinator configured for db 0; the per-call options select db 7.
        let (endpoints, redlock) = cluster(3);
        let options = RedlockOptions {
            db: 7,
            ..fast_options()
        };

        let mut lock = redlock
            .acquire_with_options(&["{r}db"], Duration::from_secs(2), options)
            .await
            .unwrap();
        let value = lock.value().to_string();
        for endpoint in &endpoints {
            assert_eq!(
                endpoint.value_of(7, "{r}db").await.as_deref(),
                Some(value.as_str())
            );
            assert_eq!(endpoint.value_of(0, "{r}db").await, None);
        }

        // Extend must target the database the lock was acquired under, not
        // the coordinator's.
        lock.extend(Duration::from_secs(10)).await.unwrap();
        assert_eq!(lock.attempts()[0].votes_for.len(), 3);
        for endpoint in &endpoints {
            assert!(endpoint.pttl(7, "{r}db").await.unwrap() > Duration::from_secs(5));
        }

        // Release likewise.
        let record = lock.release().await.unwrap();
        assert_eq!(record.votes_for.len(), 3);
        for endpoint in &endpoints {
            assert_eq!(endpoint.value_of(7, "{r}db").await, None);
        }
    }

    #[tokio::test]
    async fn test_per_call_drift_factor_shapes_validity() {
        let (_, redlock) = cluster(3);
        let options = RedlockOptions {
            drift_factor: 0.5,
            ..fast_options()
        };

        // Half the duration is surrendered to the per-call drift allowance,
        // regardless of the coordinator's own drift factor.
        let lock = redlock
            .acquire_with_options(&["{r}dr"], Duration::from_secs(10), options)
            .await
            .unwrap();
        assert!(lock.remaining_validity() <= Duration::from_secs(5));
        assert!(lock.remaining_validity() > Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_extend_advances_expiration_and_keeps_value() {
        let (endpoints, redlock) = cluster(3);
        let mut lock = redlock
            .acquire(&["{r}e"], Duration::from_secs(2))
            .await
            .unwrap();
        let value = lock.value().to_string();
        let before = lock.expiration();

        lock.extend(Duration::from_secs(10)).await.unwrap();
        assert!(lock.expiration() > before);
        assert_eq!(lock.value(), value);
        assert_eq!(lock.attempts().len(), 1);

        for endpoint in &endpoints {
            assert_eq!(endpoint.value_of(0, "{r}e").await.as_deref(), Some(value.as_str()));
            assert!(endpoint.pttl(0, "{r}e").await.unwrap() > Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn test_extend_after_loss_invalidates_handle() {
        let (endpoints, redlock) = cluster(3);
        let mut lock = redlock
            .acquire(&["{r}l"], Duration::from_secs(5))
            .await
            .unwrap();

        for endpoint in &endpoints {
            endpoint.set_offline(true);
        }
        let err = lock.extend(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, RedlockError::Execution { .. }));
        assert_eq!(lock.remaining_validity(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_extend_does_not_roll_back_surviving_votes() {
        let (endpoints, redlock) = cluster(3);
        let mut lock = redlock
            .acquire(&["{r}k"], Duration::from_secs(5))
            .await
            .unwrap();
        let value = lock.value().to_string();

        // A minority extension vote must not trigger a rollback: the keys
        // are still legitimately held until their prior expiry.
        endpoints[1].set_offline(true);
        endpoints[2].set_offline(true);
        let _ = lock.extend(Duration::from_secs(5)).await.unwrap_err();

        assert_eq!(
            endpoints[0].value_of(0, "{r}k").await.as_deref(),
            Some(value.as_str())
        );
    }

    #[tokio::test]
    async fn test_unbounded_retry_count_keeps_trying() {
        let (endpoints, redlock) = cluster(1);
        let holder = redlock
            .acquire(&["{r}u"], Duration::from_millis(400))
            .await
            .unwrap();
        drop(holder);

        // With retry_count < 0 the loop must outlive the holder's expiry
        // rather than exhausting after retry_count + 1 attempts.
        let options = RedlockOptions {
            retry_count: -1,
            retry_delay: Duration::from_millis(50),
            retry_jitter: Duration::ZERO,
            ..RedlockOptions::default()
        };
        let lock = redlock
            .acquire_with_options(&["{r}u"], Duration::from_secs(2), options)
            .await
            .unwrap();
        assert!(lock.attempts().len() > 1);
        assert_eq!(
            endpoints[0].value_of(0, "{r}u").await.as_deref(),
            Some(lock.value())
        );
    }

    #[tokio::test]
    async fn test_ping_reports_per_endpoint_liveness() {
        let (endpoints, redlock) = cluster(3);
        endpoints[1].set_offline(true);

        let record = redlock.ping().await;
        assert_eq!(record.votes_for.len(), 2);
        assert!(record.votes_against.contains_key("mem-1"));
    }

    #[test]
    fn test_retry_pause_is_clamped_non_negative() {
        let options = RedlockOptions {
            retry_delay: Duration::from_millis(10),
            retry_jitter: Duration::from_millis(100),
            ..RedlockOptions::default()
        };
        for _ in 0..100 {
            let pause = retry_pause(&options);
            assert!(pause <= Duration::from_millis(110));
        }
    }
}
