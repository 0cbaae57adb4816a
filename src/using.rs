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

//! Scoped execution under a held lock.
//!
//! ## Purpose
//! Runs caller-supplied work inside a lock, extending it in the background
//! whenever its remaining validity runs low, and delivering a cooperative
//! cancellation signal the moment safety is lost. The routine is never
//! forcibly cancelled; it is expected to observe the signal at its own
//! checkpoints.
//!
//! ## Flow
//! 1. Acquire the lock (acquisition failures propagate).
//! 2. Spawn the keep-alive task; hand the routine a [`LockSignal`].
//! 3. When the routine settles: stop the keep-alive task, then release.
//!    Release failures are swallowed and logged; the routine's output wins.

use crate::error::{RedlockError, RedlockResult};
use crate::lock::Lock;
use crate::options::RedlockOptions;
use crate::redlock::Redlock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Observable safety signal handed to a scoped routine.
///
/// Once an automatic extension fails, `error` is set before `aborted`, so
/// any read that observes `aborted() == true` also observes the failure in
/// `error()`.
pub struct LockSignal {
    aborted: AtomicBool,
    error: StdMutex<Option<RedlockError>>,
    notify: Notify,
}

impl LockSignal {
    pub(crate) fn new() -> Self {
        Self {
            aborted: AtomicBool::new(false),
            error: StdMutex::new(None),
            notify: Notify::new(),
        }
    }

    /// True once lock safety has been lost.
    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// The extension failure that tripped the signal, if any.
    pub fn error(&self) -> Option<RedlockError> {
        match self.error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Wait until the signal trips. Returns immediately if it already has.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.aborted() {
                return;
            }
            notified.await;
        }
    }

    fn trip(&self, error: RedlockError) {
        match self.error.lock() {
            Ok(mut guard) => *guard = Some(error),
            Err(poisoned) => *poisoned.into_inner() = Some(error),
        }
        self.aborted.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

impl Redlock {
    /// Run `routine` while holding a lock on `resources`, using the
    /// coordinator's options.
    ///
    /// See [`Redlock::using_with_options`].
    pub async fn using<T, F, Fut>(
        &self,
        resources: &[&str],
        duration: Duration,
        routine: F,
    ) -> RedlockResult<T>
    where
        F: FnOnce(Arc<LockSignal>) -> Fut,
        Fut: Future<Output = T>,
    {
        self.using_with_options(resources, duration, self.options().clone(), routine)
            .await
    }

    /// Run `routine` while holding a lock on `resources`, with per-call
    /// options.
    ///
    /// The lock is extended in the background for the original `duration`
    /// whenever its remaining validity drops below
    /// `automatic_extension_threshold`; extensions never overlap. One failed
    /// extension ends keep-alive and trips the routine's [`LockSignal`].
    ///
    /// The routine's output is returned verbatim; a fallible routine should
    /// make its own output a `Result`. The lock is released after the
    /// routine settles, and release failures are swallowed (logged at warn)
    /// so they never mask the routine's outcome.
    pub async fn using_with_options<T, F, Fut>(
        &self,
        resources: &[&str],
        duration: Duration,
        options: RedlockOptions,
        routine: F,
    ) -> RedlockResult<T>
    where
        F: FnOnce(Arc<LockSignal>) -> Fut,
        Fut: Future<Output = T>,
    {
        let threshold = options.automatic_extension_threshold;
        let lock = self
            .acquire_with_options(resources, duration, options)
            .await?;

        let signal = Arc::new(LockSignal::new());
        let shared = Arc::new(Mutex::new(Some(lock)));
        let keep_alive = tokio::spawn(keep_alive_loop(
            shared.clone(),
            signal.clone(),
            duration,
            threshold,
        ));

        let output = routine(signal.clone()).await;

        // Stop the timer before releasing so no extension can be scheduled
        // after the release.
        keep_alive.abort();
        let _ = keep_alive.await;

        let lock = shared.lock().await.take();
        if let Some(lock) = lock {
            let value = lock.value().to_string();
            if let Err(err) = lock.release().await {
                warn!(error = %err, value = %value, "failed to release scoped lock");
            }
        }

        Ok(output)
    }
}

/// Background extension loop: sleep until the lock's validity is about to
/// drop below the threshold, extend, reschedule. A single failed extension
/// trips the signal and ends the loop.
async fn keep_alive_loop(
    shared: Arc<Mutex<Option<Lock>>>,
    signal: Arc<LockSignal>,
    duration: Duration,
    threshold: Duration,
) {
    loop {
        let expiration = {
            let guard = shared.lock().await;
            match guard.as_ref() {
                Some(lock) => lock.expiration(),
                None => return,
            }
        };
        let extend_at = expiration
            .checked_sub(threshold)
            .unwrap_or_else(Instant::now);
        tokio::time::sleep_until(extend_at).await;

        let mut guard = shared.lock().await;
        let Some(lock) = guard.as_mut() else { return };
        match lock.extend(duration).await {
            Ok(()) => {
                debug!(
                    remaining_ms = lock.remaining_validity().as_millis() as u64,
                    "extended scoped lock"
                );
            }
            Err(err) => {
                warn!(error = %err, "automatic lock extension failed");
                signal.trip(err);
                return;
            }
        }
    }
}
