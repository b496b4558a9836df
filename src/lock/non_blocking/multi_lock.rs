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
use std::future::Future;
use tracing::warn;

use crate::context::LockContext;
use crate::errors::{RedleaseError, RedleaseResult};
use crate::lock::non_blocking::coordinator::AsyncLockCoordinator;
use crate::lock::LockRequest;
use crate::store::ReleaseOutcome;

/// Async twin of [`MultiLock`](crate::MultiLock): ordered batch acquisition
/// with rollback, release in acquisition order, work guarded between the two.
pub struct AsyncMultiLock {
    coordinator: AsyncLockCoordinator,
    requests: Vec<LockRequest>,
}

impl AsyncMultiLock {
    pub fn new(coordinator: AsyncLockCoordinator, requests: Vec<LockRequest>) -> Self {
        Self {
            coordinator,
            requests,
        }
    }

    pub async fn lock_all(&self, ctx: &LockContext) -> RedleaseResult<()> {
        self.validate()?;

        let mut acquired: Vec<&LockRequest> = Vec::new();
        for request in &self.requests {
            let locked = match self.coordinator.try_lock(ctx, request).await {
                Ok(locked) => locked,
                Err(e) => {
                    self.rollback(ctx, &acquired).await;
                    return Err(e);
                }
            };
            if !locked {
                self.rollback(ctx, &acquired).await;
                return Err(RedleaseError::LockUnavailable(request.message.clone()));
            }
            acquired.push(request);
        }
        Ok(())
    }

    pub async fn unlock_all(&self, ctx: &LockContext) -> RedleaseResult<()> {
        self.validate()?;

        let mut any_still_held = false;
        let mut released_any = false;
        let mut first_error: Option<RedleaseError> = None;

        for request in &self.requests {
            match self.coordinator.release(ctx, request).await {
                Ok(ReleaseOutcome::StillHeld) => any_still_held = true,
                Ok(_) => released_any = true,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if released_any && !any_still_held {
            ctx.clear();
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn with_locks<R, F, Fut>(&self, ctx: &LockContext, work: F) -> RedleaseResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.lock_all(ctx).await?;

        let out = work().await;

        if let Err(e) = self.unlock_all(ctx).await {
            warn!("release after guarded batch failed: {}", e);
        }
        Ok(out)
    }

    fn validate(&self) -> RedleaseResult<()> {
        if self.requests.is_empty() {
            return Err(RedleaseError::ConfigError(
                "Lock batch cannot be empty".to_string(),
            ));
        }
        for request in &self.requests {
            request.validate()?;
        }
        Ok(())
    }

    async fn rollback(&self, ctx: &LockContext, acquired: &[&LockRequest]) {
        let mut any_still_held = false;
        for request in acquired {
            match self.coordinator.release(ctx, request).await {
                Ok(ReleaseOutcome::StillHeld) => any_still_held = true,
                Ok(_) => {}
                Err(e) => warn!("rollback release of lock [{}] failed: {}", request.key, e),
            }
        }
        if !acquired.is_empty() && !any_still_held {
            ctx.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedleaseConfig;
    use crate::store::MemoryLeaseStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn test_setup(
        requests: Vec<LockRequest>,
    ) -> (AsyncLockCoordinator, AsyncMultiLock) {
        let store = Arc::new(MemoryLeaseStore::new());
        let coordinator = AsyncLockCoordinator::with_store(store, &RedleaseConfig::default());
        let multi = AsyncMultiLock::new(coordinator.clone(), requests);
        (coordinator, multi)
    }

    fn request(key: &str) -> LockRequest {
        LockRequest::new(key).with_auto_renew(false)
    }

    #[tokio::test]
    async fn test_batch_acquires_and_releases() {
        let (coordinator, multi) = test_setup(vec![request("one"), request("two")]);
        let ctx = LockContext::new("batch");

        multi.lock_all(&ctx).await.unwrap();
        assert!(coordinator.is_locked("one").await.unwrap());
        assert!(coordinator.is_locked("two").await.unwrap());

        multi.unlock_all(&ctx).await.unwrap();
        assert!(!coordinator.is_locked("one").await.unwrap());
        assert!(!coordinator.is_locked("two").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back_and_skips_rest() {
        let (coordinator, multi) = test_setup(vec![
            request("first"),
            request("second").with_message("second is busy"),
            request("third"),
        ]);
        let ctx = LockContext::new("batch");
        let other = LockContext::new("other");

        assert!(coordinator.try_lock(&other, &request("second")).await.unwrap());

        let worked = Arc::new(AtomicBool::new(false));
        let flag = worked.clone();
        let err = multi
            .with_locks(&ctx, move || async move { flag.store(true, Ordering::SeqCst) })
            .await
            .unwrap_err();

        match err {
            RedleaseError::LockUnavailable(message) => assert_eq!(message, "second is busy"),
            other => panic!("expected LockUnavailable, got {:?}", other),
        }
        assert!(!worked.load(Ordering::SeqCst));
        assert!(!coordinator.is_locked("first").await.unwrap());
        assert!(!coordinator.is_locked("third").await.unwrap());
        assert!(coordinator.is_locked("second").await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_work_result_passes_through() {
        let (_, multi) = test_setup(vec![request("a")]);
        let ctx = LockContext::new("batch");

        let result: Result<u32, &str> = multi
            .with_locks(&ctx, || async { Err("downstream failed") })
            .await
            .unwrap();
        assert_eq!(result, Err("downstream failed"));
    }
}
