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
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::RedleaseConfig;
use crate::connection::AsyncRedisConnectionManager;
use crate::context::LockContext;
use crate::errors::{RedleaseError, RedleaseResult};
use crate::lock::non_blocking::watchdog::AsyncRenewalWatchdog;
use crate::lock::LockRequest;
use crate::store::{AcquireOutcome, AsyncLeaseStore, AsyncRedisLeaseStore, ReleaseOutcome};

/// Async lock coordinator. Semantics mirror the blocking
/// [`LockCoordinator`](crate::LockCoordinator); waiting happens on the tokio
/// timer instead of the calling thread, and watchdogs are tokio tasks.
pub struct AsyncLockCoordinator {
    store: Arc<dyn AsyncLeaseStore>,
    key_prefix: String,
    retry_interval: Duration,
    watchdogs: Arc<Mutex<HashMap<String, AsyncRenewalWatchdog>>>,
}

impl AsyncLockCoordinator {
    pub fn new(config: &RedleaseConfig) -> RedleaseResult<Self> {
        let connection_manager = Arc::new(AsyncRedisConnectionManager::new(config)?);
        let store = Arc::new(AsyncRedisLeaseStore::new(connection_manager));
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn AsyncLeaseStore>, config: &RedleaseConfig) -> Self {
        Self {
            store,
            key_prefix: config.key_prefix.clone(),
            retry_interval: config.retry_interval,
            watchdogs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn try_lock(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
    ) -> RedleaseResult<bool> {
        request.validate()?;

        let key = self.lease_key(&request.key);
        let owner = ctx.resolve(request.reentrant);
        let start = Instant::now();

        loop {
            match self
                .store
                .acquire_or_increment(&key, request.lease_time, &owner)
                .await?
            {
                AcquireOutcome::Acquired => {
                    debug!("lock [{}] acquired by [{}]", key, owner);
                    if request.auto_renew {
                        self.start_watchdog(ctx, &key, &owner, request.lease_time).await;
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
                    sleep(self.retry_interval).await;
                }
            }
        }
    }

    pub async fn unlock(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
    ) -> RedleaseResult<ReleaseOutcome> {
        let outcome = self.release(ctx, request).await?;
        if outcome != ReleaseOutcome::StillHeld {
            ctx.clear();
        }
        Ok(outcome)
    }

    pub(crate) async fn release(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
    ) -> RedleaseResult<ReleaseOutcome> {
        request.validate()?;

        let key = self.lease_key(&request.key);
        let owner = ctx.resolve(request.reentrant);

        match self.store.release_or_decrement(&key, &owner).await {
            Ok(outcome) => {
                match outcome {
                    ReleaseOutcome::Released => {
                        debug!("lock [{}] fully released by [{}]", key, owner);
                        self.stop_watchdog(&key).await;
                    }
                    ReleaseOutcome::Absent => {
                        debug!("lock [{}] not held by [{}], release is a no-op", key, owner);
                        self.stop_watchdog(&key).await;
                    }
                    ReleaseOutcome::StillHeld => {
                        debug!("lock [{}] still held by [{}] after nested release", key, owner);
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("release of lock [{}] could not be confirmed: {}", key, e);
                self.stop_watchdog(&key).await;
                ctx.clear();
                Err(e)
            }
        }
    }

    pub async fn with_lock<R, F, Fut>(
        &self,
        ctx: &LockContext,
        request: &LockRequest,
        work: F,
    ) -> RedleaseResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        if !self.try_lock(ctx, request).await? {
            return Err(RedleaseError::LockUnavailable(request.message.clone()));
        }

        let out = work().await;

        if let Err(e) = self.unlock(ctx, request).await {
            warn!("release after guarded work on [{}] failed: {}", request.key, e);
        }
        Ok(out)
    }

    pub async fn force_unlock(&self, key: &str) -> RedleaseResult<bool> {
        let key = self.lease_key(key);
        self.stop_watchdog(&key).await;
        self.store.force_clear(&key).await
    }

    pub async fn is_locked(&self, key: &str) -> RedleaseResult<bool> {
        Ok(self.remaining_time(key).await?.is_some())
    }

    pub async fn remaining_time(&self, key: &str) -> RedleaseResult<Option<Duration>> {
        self.store.remaining_ttl(&self.lease_key(key)).await
    }

    fn lease_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn start_watchdog(&self, ctx: &LockContext, key: &str, owner: &str, lease: Duration) {
        let replaced = {
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

            let watchdog = AsyncRenewalWatchdog::spawn(lease / 2, move || {
                let store = store.clone();
                let ctx = ctx.clone();
                let lease_key = lease_key.clone();
                let owner = owner.clone();

                async move {
                    match store.renew_if_owner(&lease_key, lease, &owner).await {
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
                            error!("lease [{}] renewal failed: {}", lease_key, e);
                            ctx.clear();
                            false
                        }
                    }
                }
            });

            watchdogs.insert(key.to_string(), watchdog)
        };

        if let Some(old) = replaced {
            old.stop().await;
        }
    }

    async fn stop_watchdog(&self, key: &str) {
        let watchdog = { self.watchdogs.lock().remove(key) };
        if let Some(watchdog) = watchdog {
            watchdog.stop().await;
        }
    }
}

impl Clone for AsyncLockCoordinator {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key_prefix: self.key_prefix.clone(),
            retry_interval: self.retry_interval,
            watchdogs: self.watchdogs.clone(),
        }
    }
}
