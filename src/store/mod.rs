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
mod blocking;
mod memory;
mod non_blocking;

pub use blocking::*;
pub use memory::*;
pub use non_blocking::*;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::RedleaseResult;

/// Result of Acquire-or-Increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Lease created, or nested hold stacked onto an existing lease.
    Acquired,
    /// Another owner holds a live lease. The remaining TTL is diagnostic
    /// only; correctness never depends on it.
    Held { remaining_ttl: Duration },
}

/// Result of Release-or-Decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No record, or the record belongs to another owner. A no-op, not an
    /// error: expiry-driven takeover makes this a legitimate state.
    Absent,
    /// Hold count reached zero and the record was deleted.
    Released,
    /// A nested hold remains.
    StillHeld,
}

/// The three lease operations, each executed as one indivisible unit against
/// the store. The conceptual record behind a key is
/// `{ owner token, hold count >= 1, expires-at }`; these operations are the
/// only way it is ever read or written, so every invariant on it is enforced
/// here and nowhere else.
pub trait LeaseStore: Send + Sync {
    /// Create the lease for `owner`, or stack a nested hold when `owner`
    /// already holds it. Both paths reset the TTL to `lease`.
    fn acquire_or_increment(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<AcquireOutcome>;

    /// Extend the TTL to `lease` iff `owner` still holds the key.
    fn renew_if_owner(&self, key: &str, lease: Duration, owner: &str) -> RedleaseResult<bool>;

    /// Drop one hold; delete the record when the count reaches zero.
    fn release_or_decrement(&self, key: &str, owner: &str) -> RedleaseResult<ReleaseOutcome>;

    /// Administrative delete regardless of owner or hold count.
    fn force_clear(&self, key: &str) -> RedleaseResult<bool>;

    /// Remaining TTL of a live lease, `None` when there is none. Observability
    /// only.
    fn remaining_ttl(&self, key: &str) -> RedleaseResult<Option<Duration>>;
}

/// Async twin of [`LeaseStore`].
#[async_trait]
pub trait AsyncLeaseStore: Send + Sync {
    async fn acquire_or_increment(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<AcquireOutcome>;

    async fn renew_if_owner(&self, key: &str, lease: Duration, owner: &str)
        -> RedleaseResult<bool>;

    async fn release_or_decrement(&self, key: &str, owner: &str) -> RedleaseResult<ReleaseOutcome>;

    async fn force_clear(&self, key: &str) -> RedleaseResult<bool>;

    async fn remaining_ttl(&self, key: &str) -> RedleaseResult<Option<Duration>>;
}
