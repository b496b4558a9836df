/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::config::RedleaseConfig;
use crate::connection::SyncRedisConnectionManager;
use crate::context::LockContext;
use crate::errors::{RedleaseError, RedleaseResult};
use crate::lock::blocking::watchdog::RenewalWatchdog;
use crate::lock::LockRequest;
use crate::store::{AcquireOutcome, LeaseStore, RedisLeaseStore, ReleaseOutcome};

/// Blocking lock coordinator.
///
/// Owns the acquire/retry loop, the reentrancy handshake with the caller's
/// [`LockContext`], and the lifecycle of one renewal watchdog per held key.
/// The store is the only serialization point between processes; the
/// coordinator itself takes no cross-process locks.
pub struct LockCoordinator {
    store: Arc<dyn LeaseStore>,
    key_prefix: String,
    retry_interval: Duration,
    watchdogs: Arc<Mutex<HashMap<String, RenewalWatchdog>>>,
}

impl LockCoordinator {
    /// Coordinator over a pooled Redis connection built from `config`.
    pub fn new(config: &RedleaseConfig) -> RedleaseResult<Self> {
        let connection_manager = Arc::new(SyncRedisConnectionManager::new(config)?);
        let store = Arc::new(RedisLeaseStore::new(connection_manager));
        Ok(Self::with_store(store, config))
    }

    /// Coordinator over any lease store implementation.
    pub fn with_store(store: Arc<dyn LeaseStore>, config: &RedleaseConfig) -> Self {
        Self {
            store,
            key_prefix: config.key_prefix.clone(),
            retry_interval: config.retry_interval,
            watchdogs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Try to acquire, retrying until `request.wait_time` is exhausted.
    ///
    /// Returns `Ok(false)` on timeout; a zero wait time means exactly one
    /// attempt. Store errors surface immediately, the lock state is then
    /// unknown and nothing was retained locally.
    pub fn try_lock(&self, ctx: &LockContext, request: &LockRequest) -> RedleaseResult<bool> {
        request.validate()?;

        let key = self.lease_key(&request.key);
        let owner = ctx.resolve(request.reentrant);
        let start = Instant::now();

        loop {
            match self
                .store
                .acquire_or_increment(&key, request.lease_time, &owner)?
            {
                AcquireOutcome::Acquired => {
                    debug!("lock [{}] acquired by [{}]", key, owner);
                    if request.auto_renew {
                        self.start_watchdog(ctx, &key, &owner, request.lease_time);
                    }
                    return Ok(true);
                }
                AcquireOutcome::Held { remaining_ttl } => {
                    if start.elapsed() >= request.wait_time {
                        debug!(
                            "lock [{}] unavailable to [{}], current lease has {}ms left",
                            key,
                            owner,
                            remaining_ttl.as_millis()
                        );
                        return Ok(false);
                    }
                    thread::sleep(self.retry_interval);
                }
            }
        }
    }

    /// Release one hold.
    ///
    /// A full release (or a no-op `Absent`) clears the caller's identity slot
    /// and stops the key's watchdog; a nested release leaves both running.
    pub fn unlock(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
    ) -> RedleaseResult<ReleaseOutcome> {
        let outcome = self.release(ctx, request)?;
        if outcome != ReleaseOutcome::StillHeld {
            ctx.clear();
        }
        Ok(outcome)
    }

    /// Release without touching the context slot; batch release owns that
    /// decision (the slot must survive until the whole batch is done).
    pub(crate) fn release(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
    ) -> RedleaseResult<ReleaseOutcome> {
        request.validate()?;

        let key = self.lease_key(&request.key);
        let owner = ctx.resolve(request.reentrant);

        match self.store.release_or_decrement(&key, &owner) {
            Ok(outcome) => {
                match outcome {
                    ReleaseOutcome::Released => {
                        debug!("lock [{}] fully released by [{}]", key, owner);
                        self.stop_watchdog(&key);
                    }
                    ReleaseOutcome::Absent => {
                        debug!("lock [{}] not held by [{}], release is a no-op", key, owner);
                        self.stop_watchdog(&key);
                    }
                    ReleaseOutcome::StillHeld => {
                        debug!("lock [{}] still held by [{}] after nested release", key, owner);
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                // Cannot confirm the release. Drop local belief so this
                // context does not stay wedged on a lease it cannot prove,
                // then surface the error.
                warn!("release of lock [{}] could not be confirmed: {}", key, e);
                self.stop_watchdog(&key);
                ctx.clear();
                Err(e)
            }
        }
    }

    /// Acquire, run `work`, always release.
    ///
    /// The unit of work only runs when the lock was acquired; its own result
    /// passes through untouched. An exhausted wait surfaces as
    /// [`RedleaseError::LockUnavailable`] carrying the request's message.
    pub fn with_lock<R>(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
        work: impl FnOnce() -> R,
    ) -> RedleaseResult<R> {
        if !self.try_lock(ctx, request)? {
            return Err(RedleaseError::LockUnavailable(request.message.clone()));
        }

        let out = work();

        if let Err(e) = self.unlock(ctx, request) {
            warn!("release after guarded work on [{}] failed: {}", request.key, e);
        }
        Ok(out)
    }

    /// Delete the lease regardless of owner and hold count.
    pub fn force_unlock(&self, key: &str) -> RedleaseResult<bool> {
        let key = self.lease_key(key);
        self.stop_watchdog(&key);
        self.store.force_clear(&key)
    }

    pub fn is_locked(&self, key: &str) -> RedleaseResult<bool> {
        Ok(self.remaining_time(key)?.is_some())
    }

    /// Remaining TTL of the key's live lease, if any.
    pub fn remaining_time(&self, key: &str) -> RedleaseResult<Option<Duration>> {
        self.store.remaining_ttl(&self.lease_key(key))
    }

    fn lease_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn start_watchdog(&self, ctx: &LockContext, key: &str, owner: &str, lease: Duration) {
        let mut watchdogs = self.watchdogs.lock();

        // A live watchdog means this is a nested reentrant acquisition
        if let Some(existing) = watchdogs.get(key) {
            if !existing.is_cancelled() {
                return;
            }
        }

        let store = self.store.clone();
        let ctx = ctx.clone();
        let lease_key = key.to_string();
        let owner = owner.to_string();

        let watchdog = RenewalWatchdog::spawn(lease / 2, move || {
            match store.renew_if_owner(&lease_key, lease, &owner) {
                Ok(true) => {
                    debug!("lease [{}] renewed for [{}]", lease_key, owner);
                    true
                }
                Ok(false) => {
                    debug!(
                        "lease [{}] no longer held by [{}], renewal stopped",
                        lease_key, owner
                    );
                    ctx.clear();
                    false
                }
                Err(e) => {
                    // A renewal the store cannot confirm counts as ownership
                    // loss; a lease this process cannot prove it owns must not
                    // be kept alive.
                    error!("lease [{}] renewal failed: {}", lease_key, e);
                    ctx.clear();
                    false
                }
            }
        });

        let replaced = watchdogs.insert(key.to_string(), watchdog);
        drop(watchdogs);
        if let Some(old) = replaced {
            old.stop();
        }
    }

    fn stop_watchdog(&self, key: &str) {
        let watchdog = self.watchdogs.lock().remove(key);
        if let Some(watchdog) = watchdog {
            watchdog.stop();
        }
    }
}

impl Clone for LockCoordinator {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key_prefix: self.key_prefix.clone(),
            retry_interval: self.retry_interval,
            watchdogs: self.watchdogs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeaseStore;

    fn test_coordinator() -> (Arc<MemoryLeaseStore>, LockCoordinator) {
        let store = Arc::new(MemoryLeaseStore::new());
        let coordinator =
            LockCoordinator::with_store(store.clone(), &RedleaseConfig::default());
        (store, coordinator)
    }

    #[test]
    fn test_mutual_exclusion_between_contexts() {
        let (_, coordinator) = test_coordinator();
        let a = LockContext::new("a");
        let b = LockContext::new("b");
        let request = LockRequest::new("shared").with_auto_renew(false);

        assert!(coordinator.try_lock(&a, &request).unwrap());
        assert!(!coordinator.try_lock(&b, &request).unwrap());

        coordinator.unlock(&a, &request).unwrap();
        assert!(coordinator.try_lock(&b, &request).unwrap());
        coordinator.unlock(&b, &request).unwrap();
    }

    #[test]
    fn test_reentrant_hold_needs_two_releases() {
        let (_, coordinator) = test_coordinator();
        let ctx = LockContext::new("nested");
        let other = LockContext::new("other");
        let request = LockRequest::new("job").with_auto_renew(false);

        assert!(coordinator.try_lock(&ctx, &request).unwrap());
        assert!(coordinator.try_lock(&ctx, &request).unwrap());

        assert_eq!(
            coordinator.unlock(&ctx, &request).unwrap(),
            ReleaseOutcome::StillHeld
        );
        assert!(!coordinator.try_lock(&other, &request).unwrap());
        assert!(ctx.current_token().is_some());

        assert_eq!(
            coordinator.unlock(&ctx, &request).unwrap(),
            ReleaseOutcome::Released
        );
        assert!(ctx.current_token().is_none());
        assert!(coordinator.try_lock(&other, &request).unwrap());
    }

    #[test]
    fn test_wait_time_bounds_acquisition() {
        let (_, coordinator) = test_coordinator();
        let a = LockContext::new("a");
        let b = LockContext::new("b");
        let hold = LockRequest::new("order:42")
            .with_lease_time(Duration::from_millis(2000))
            .with_auto_renew(false);
        let contend = hold.clone().with_wait_time(Duration::from_millis(100));

        assert!(coordinator.try_lock(&a, &hold).unwrap());

        let start = Instant::now();
        assert!(!coordinator.try_lock(&b, &contend).unwrap());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(600));

        coordinator.unlock(&a, &hold).unwrap();
        assert!(coordinator.try_lock(&b, &contend).unwrap());
        coordinator.unlock(&b, &contend).unwrap();
    }

    #[test]
    fn test_expired_lease_can_be_taken_over() {
        let (_, coordinator) = test_coordinator();
        let a = LockContext::new("crashed");
        let b = LockContext::new("survivor");
        let request = LockRequest::new("volatile")
            .with_lease_time(Duration::from_millis(150))
            .with_auto_renew(false);

        assert!(coordinator.try_lock(&a, &request).unwrap());
        // Not before expiry
        assert!(!coordinator.try_lock(&b, &request).unwrap());

        thread::sleep(Duration::from_millis(250));
        assert!(coordinator.try_lock(&b, &request).unwrap());
        coordinator.unlock(&b, &request).unwrap();
    }

    #[test]
    fn test_release_of_unheld_key_is_a_noop() {
        let (_, coordinator) = test_coordinator();
        let a = LockContext::new("holder");
        let b = LockContext::new("stranger");
        let request = LockRequest::new("stable").with_auto_renew(false);

        assert_eq!(
            coordinator.unlock(&b, &request).unwrap(),
            ReleaseOutcome::Absent
        );

        assert!(coordinator.try_lock(&a, &request).unwrap());
        assert_eq!(
            coordinator.unlock(&b, &request).unwrap(),
            ReleaseOutcome::Absent
        );
        // The real holder is unaffected
        assert!(coordinator.is_locked("stable").unwrap());
        assert_eq!(
            coordinator.unlock(&a, &request).unwrap(),
            ReleaseOutcome::Released
        );
    }

    #[test]
    fn test_watchdog_keeps_short_lease_alive() {
        let (_, coordinator) = test_coordinator();
        let holder = LockContext::new("renewing");
        let contender = LockContext::new("contender");
        let request = LockRequest::new("busy").with_lease_time(Duration::from_millis(240));

        assert!(coordinator.try_lock(&holder, &request).unwrap());

        // Three lease durations later the lock must still be held
        thread::sleep(Duration::from_millis(720));
        assert!(coordinator.is_locked("busy").unwrap());
        assert!(!coordinator
            .try_lock(&contender, &request.clone().with_auto_renew(false))
            .unwrap());

        coordinator.unlock(&holder, &request).unwrap();
        assert!(!coordinator.is_locked("busy").unwrap());
    }

    #[test]
    fn test_no_renewal_before_half_lease() {
        let (_, coordinator) = test_coordinator();
        let holder = LockContext::new("patient");
        let request = LockRequest::new("slow").with_lease_time(Duration::from_millis(400));

        assert!(coordinator.try_lock(&holder, &request).unwrap());

        // Before lease/2 the TTL is still burning down from the acquisition
        thread::sleep(Duration::from_millis(120));
        let remaining = coordinator.remaining_time("slow").unwrap().unwrap();
        assert!(remaining <= Duration::from_millis(300));

        coordinator.unlock(&holder, &request).unwrap();
    }

    #[test]
    fn test_lost_lease_cancels_watchdog_and_clears_identity() {
        let (store, coordinator) = test_coordinator();
        let holder = LockContext::new("loser");
        let request = LockRequest::new("stolen").with_lease_time(Duration::from_millis(200));

        assert!(coordinator.try_lock(&holder, &request).unwrap());
        assert!(holder.current_token().is_some());

        // Simulate takeover: the record vanishes behind the watchdog's back
        store.force_clear("LK_stolen").unwrap();

        // Next renewal tick (at lease/2) must fail, cancel, and clear
        thread::sleep(Duration::from_millis(350));
        assert!(holder.current_token().is_none());

        // The context starts over cleanly
        assert!(coordinator.try_lock(&holder, &request).unwrap());
        coordinator.unlock(&holder, &request).unwrap();
    }

    #[test]
    fn test_with_lock_runs_work_and_releases() {
        let (_, coordinator) = test_coordinator();
        let ctx = LockContext::new("worker");
        let request = LockRequest::new("guarded").with_auto_renew(false);

        let result = coordinator.with_lock(&ctx, &request, || 41 + 1).unwrap();
        assert_eq!(result, 42);
        assert!(!coordinator.is_locked("guarded").unwrap());
    }

    #[test]
    fn test_with_lock_surfaces_configured_message() {
        let (_, coordinator) = test_coordinator();
        let a = LockContext::new("a");
        let b = LockContext::new("b");
        let request = LockRequest::new("contested")
            .with_message("inventory busy")
            .with_auto_renew(false);

        assert!(coordinator.try_lock(&a, &request).unwrap());

        let err = coordinator
            .with_lock(&b, &request, || unreachable!("work must not run"))
            .unwrap_err();
        match err {
            RedleaseError::LockUnavailable(message) => assert_eq!(message, "inventory busy"),
            other => panic!("expected LockUnavailable, got {:?}", other),
        }

        coordinator.unlock(&a, &request).unwrap();
    }

    #[test]
    fn test_force_unlock_clears_nested_holds() {
        let (_, coordinator) = test_coordinator();
        let ctx = LockContext::new("stuck");
        let request = LockRequest::new("wedged").with_auto_renew(false);

        assert!(coordinator.try_lock(&ctx, &request).unwrap());
        assert!(coordinator.try_lock(&ctx, &request).unwrap());

        assert!(coordinator.force_unlock("wedged").unwrap());
        assert!(!coordinator.is_locked("wedged").unwrap());
        assert!(!coordinator.force_unlock("wedged").unwrap());
    }
}
