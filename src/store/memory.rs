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
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::RedleaseResult;
use crate::store::{AcquireOutcome, AsyncLeaseStore, LeaseStore, ReleaseOutcome};

struct LeaseRecord {
    owner: String,
    hold_count: u32,
    expires_at: Instant,
}

/// In-process lease store with the same record semantics as the Redis
/// scripts. Used by the test suite, and usable as a deterministic stand-in
/// wherever a process-local coordinator is enough.
#[derive(Default)]
pub struct MemoryLeaseStore {
    records: Mutex<HashMap<String, LeaseRecord>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, key: &str, lease: Duration, owner: &str) -> AcquireOutcome {
        let mut records = self.records.lock();
        let now = Instant::now();

        match records.get_mut(key) {
            Some(record) if record.expires_at > now => {
                if record.owner == owner {
                    record.hold_count += 1;
                    record.expires_at = now + lease;
                    AcquireOutcome::Acquired
                } else {
                    AcquireOutcome::Held {
                        remaining_ttl: record.expires_at - now,
                    }
                }
            }
            _ => {
                // Absent or expired: the lease is up for grabs
                records.insert(
                    key.to_string(),
                    LeaseRecord {
                        owner: owner.to_string(),
                        hold_count: 1,
                        expires_at: now + lease,
                    },
                );
                AcquireOutcome::Acquired
            }
        }
    }

    fn renew(&self, key: &str, lease: Duration, owner: &str) -> bool {
        let mut records = self.records.lock();
        let now = Instant::now();

        match records.get_mut(key) {
            Some(record) if record.expires_at > now && record.owner == owner => {
                record.expires_at = now + lease;
                true
            }
            _ => false,
        }
    }

    fn release(&self, key: &str, owner: &str) -> ReleaseOutcome {
        let mut records = self.records.lock();
        let now = Instant::now();

        match records.get_mut(key) {
            Some(record) if record.expires_at > now && record.owner == owner => {
                record.hold_count -= 1;
                if record.hold_count == 0 {
                    records.remove(key);
                    ReleaseOutcome::Released
                } else {
                    ReleaseOutcome::StillHeld
                }
            }
            _ => ReleaseOutcome::Absent,
        }
    }

    fn clear(&self, key: &str) -> bool {
        let mut records = self.records.lock();
        let now = Instant::now();
        matches!(records.remove(key), Some(record) if record.expires_at > now)
    }

    fn ttl(&self, key: &str) -> Option<Duration> {
        let records = self.records.lock();
        let now = Instant::now();
        match records.get(key) {
            Some(record) if record.expires_at > now => Some(record.expires_at - now),
            _ => None,
        }
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn acquire_or_increment(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<AcquireOutcome> {
        Ok(self.acquire(key, lease, owner))
    }

    fn renew_if_owner(&self, key: &str, lease: Duration, owner: &str) -> RedleaseResult<bool> {
        Ok(self.renew(key, lease, owner))
    }

    fn release_or_decrement(&self, key: &str, owner: &str) -> RedleaseResult<ReleaseOutcome> {
        Ok(self.release(key, owner))
    }

    fn force_clear(&self, key: &str) -> RedleaseResult<bool> {
        Ok(self.clear(key))
    }

    fn remaining_ttl(&self, key: &str) -> RedleaseResult<Option<Duration>> {
        Ok(self.ttl(key))
    }
}

#[async_trait]
impl AsyncLeaseStore for MemoryLeaseStore {
    async fn acquire_or_increment(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<AcquireOutcome> {
        Ok(self.acquire(key, lease, owner))
    }

    async fn renew_if_owner(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<bool> {
        Ok(self.renew(key, lease, owner))
    }

    async fn release_or_decrement(
        &self,
        key: &str,
        owner: &str,
    ) -> RedleaseResult<ReleaseOutcome> {
        Ok(self.release(key, owner))
    }

    async fn force_clear(&self, key: &str) -> RedleaseResult<bool> {
        Ok(self.clear(key))
    }

    async fn remaining_ttl(&self, key: &str) -> RedleaseResult<Option<Duration>> {
        Ok(self.ttl(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_acquire_creates_lease() {
        let store = MemoryLeaseStore::new();
        let outcome = store.acquire("k", Duration::from_secs(1), "a");
        assert_eq!(outcome, AcquireOutcome::Acquired);
        assert!(store.ttl("k").is_some());
    }

    #[test]
    fn test_foreign_owner_sees_remaining_ttl() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_secs(10), "a");

        match store.acquire("k", Duration::from_secs(10), "b") {
            AcquireOutcome::Held { remaining_ttl } => {
                assert!(remaining_ttl <= Duration::from_secs(10));
                assert!(remaining_ttl > Duration::from_secs(9));
            }
            other => panic!("expected Held, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_holds_need_matching_releases() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_secs(1), "a");
        store.acquire("k", Duration::from_secs(1), "a");

        assert_eq!(store.release("k", "a"), ReleaseOutcome::StillHeld);
        assert_eq!(store.release("k", "a"), ReleaseOutcome::Released);
        assert_eq!(store.release("k", "a"), ReleaseOutcome::Absent);
    }

    #[test]
    fn test_release_by_non_owner_is_absent() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_secs(1), "a");
        assert_eq!(store.release("k", "b"), ReleaseOutcome::Absent);
        // the real holder is untouched
        assert_eq!(store.release("k", "a"), ReleaseOutcome::Released);
    }

    #[test]
    fn test_expired_lease_is_reacquirable() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_millis(30), "a");
        thread::sleep(Duration::from_millis(60));

        assert!(!store.renew("k", Duration::from_millis(30), "a"));
        assert_eq!(
            store.acquire("k", Duration::from_secs(1), "b"),
            AcquireOutcome::Acquired
        );
    }

    #[test]
    fn test_renew_refreshes_only_for_owner() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_millis(200), "a");
        assert!(store.renew("k", Duration::from_secs(5), "a"));
        assert!(store.ttl("k").unwrap() > Duration::from_millis(400));
        assert!(!store.renew("k", Duration::from_secs(60), "b"));
    }

    #[test]
    fn test_force_clear_ignores_owner() {
        let store = MemoryLeaseStore::new();
        store.acquire("k", Duration::from_secs(1), "a");
        store.acquire("k", Duration::from_secs(1), "a");
        assert!(store.clear("k"));
        assert!(!store.clear("k"));
        assert_eq!(store.release("k", "a"), ReleaseOutcome::Absent);
    }
}
