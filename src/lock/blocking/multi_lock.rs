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
use tracing::warn;

use crate::context::LockContext;
use crate::errors::{RedleaseError, RedleaseResult};
use crate::lock::blocking::coordinator::LockCoordinator;
use crate::lock::LockRequest;
use crate::store::ReleaseOutcome;

/// Ordered batch of lock requests treated as one guarded unit.
///
/// Requests are acquired in declaration order. The first acquisition that
/// times out aborts the batch: everything acquired so far is released, no
/// later request is attempted, and the failing request's message surfaces as
/// [`RedleaseError::LockUnavailable`].
pub struct MultiLock {
    coordinator: LockCoordinator,
    requests: Vec<LockRequest>,
}

impl MultiLock {
    pub fn new(coordinator: LockCoordinator, requests: Vec<LockRequest>) -> Self {
        Self {
            coordinator,
            requests,
        }
    }

    /// Acquire every request in order, or nothing.
    pub fn lock_all(&self, ctx: &LockContext) -> RedleaseResult<()> {
        self.validate()?;

        let mut acquired: Vec<&LockRequest> = Vec::new();
        for request in &self.requests {
            let locked = match self.coordinator.try_lock(ctx, request) {
                Ok(locked) => locked,
                Err(e) => {
                    self.rollback(ctx, &acquired);
                    return Err(e);
                }
            };
            if !locked {
                self.rollback(ctx, &acquired);
                return Err(RedleaseError::LockUnavailable(request.message.clone()));
            }
            acquired.push(request);
        }
        Ok(())
    }

    /// Release every request in acquisition order.
    ///
    /// Each release is attempted even when an earlier one fails; the first
    /// error is reported after the sweep. The context's identity slot is
    /// cleared only once no nested hold remains anywhere in the batch.
    pub fn unlock_all(&self, ctx: &LockContext) -> RedleaseResult<()> {
        self.validate()?;

        let mut any_still_held = false;
        let mut released_any = false;
        let mut first_error: Option<RedleaseError> = None;

        for request in &self.requests {
            match self.coordinator.release(ctx, request) {
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

    /// Acquire all, run `work`, always release what was acquired.
    pub fn with_locks<R>(&self, ctx: &LockContext, work: impl FnOnce() -> R) -> RedleaseResult<R> {
        self.lock_all(ctx)?;

        let out = work();

        if let Err(e) = self.unlock_all(ctx) {
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

    fn rollback(&self, ctx: &LockContext, acquired: &[&LockRequest]) {
        let mut any_still_held = false;
        for request in acquired {
            match self.coordinator.release(ctx, request) {
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
    use crate::store::{LeaseStore, MemoryLeaseStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_setup(requests: Vec<LockRequest>) -> (Arc<MemoryLeaseStore>, LockCoordinator, MultiLock) {
        let store = Arc::new(MemoryLeaseStore::new());
        let coordinator =
            LockCoordinator::with_store(store.clone(), &RedleaseConfig::default());
        let multi = MultiLock::new(coordinator.clone(), requests);
        (store, coordinator, multi)
    }

    fn request(key: &str) -> LockRequest {
        LockRequest::new(key).with_auto_renew(false)
    }

    #[test]
    fn test_batch_acquires_and_releases_in_order() {
        let (_, coordinator, multi) =
            test_setup(vec![request("one"), request("two"), request("three")]);
        let ctx = LockContext::new("batch");

        multi.lock_all(&ctx).unwrap();
        assert!(coordinator.is_locked("one").unwrap());
        assert!(coordinator.is_locked("two").unwrap());
        assert!(coordinator.is_locked("three").unwrap());

        multi.unlock_all(&ctx).unwrap();
        assert!(!coordinator.is_locked("one").unwrap());
        assert!(!coordinator.is_locked("two").unwrap());
        assert!(!coordinator.is_locked("three").unwrap());
        assert!(ctx.current_token().is_none());
    }

    #[test]
    fn test_failed_batch_rolls_back_and_skips_rest() {
        let (store, coordinator, multi) = test_setup(vec![
            request("first"),
            request("second").with_message("second is busy"),
            request("third"),
        ]);
        let ctx = LockContext::new("batch");
        let other = LockContext::new("other");

        // Someone else holds the second key
        assert!(coordinator.try_lock(&other, &request("second")).unwrap());

        let worked = Arc::new(AtomicBool::new(false));
        let flag = worked.clone();
        let err = multi
            .with_locks(&ctx, move || flag.store(true, Ordering::SeqCst))
            .unwrap_err();

        match err {
            RedleaseError::LockUnavailable(message) => assert_eq!(message, "second is busy"),
            other => panic!("expected LockUnavailable, got {:?}", other),
        }
        // Work never ran, the first lock was released, the third was never taken
        assert!(!worked.load(Ordering::SeqCst));
        assert!(!coordinator.is_locked("first").unwrap());
        assert!(store.remaining_ttl("LK_third").unwrap().is_none());
        // The foreign hold is intact
        assert!(coordinator.is_locked("second").unwrap());
    }

    #[test]
    fn test_batch_work_result_passes_through() {
        let (_, _, multi) = test_setup(vec![request("a"), request("b")]);
        let ctx = LockContext::new("batch");

        let result: Result<u32, &str> = multi.with_locks(&ctx, || Err("downstream failed")).unwrap();
        assert_eq!(result, Err("downstream failed"));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let (_, _, multi) = test_setup(Vec::new());
        let ctx = LockContext::new("batch");
        assert!(matches!(
            multi.lock_all(&ctx),
            Err(RedleaseError::ConfigError(_))
        ));
    }

    #[test]
    fn test_nested_batch_release_keeps_outer_hold() {
        let (_, coordinator, multi) = test_setup(vec![request("shared"), request("extra")]);
        let ctx = LockContext::new("batch");
        let outer = request("shared");

        // An enclosing hold on one of the batch keys
        assert!(coordinator.try_lock(&ctx, &outer).unwrap());

        multi.lock_all(&ctx).unwrap();
        multi.unlock_all(&ctx).unwrap();

        // The outer hold survives the batch and still owns its token
        assert!(coordinator.is_locked("shared").unwrap());
        assert!(ctx.current_token().is_some());
        assert_eq!(
            coordinator.unlock(&ctx, &outer).unwrap(),
            ReleaseOutcome::Released
        );

        let wait = request("shared").with_wait_time(Duration::ZERO);
        let other = LockContext::new("other");
        assert!(coordinator.try_lock(&other, &wait).unwrap());
    }
}
