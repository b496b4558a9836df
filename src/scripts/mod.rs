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

use once_cell::sync::Lazy;
use redis::Script;

/// Acquire-or-Increment. The lease lives in a hash keyed by the owner token so
/// only the creating owner can ever touch the hold count; a single record
/// therefore never carries two owners.
///
/// Returns nil on success, otherwise the remaining TTL of the foreign lease in
/// milliseconds.
pub static ACQUIRE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local ttl = ARGV[1]
        local owner = ARGV[2]

        -- No lease: create it for this owner
        if redis.call('exists', key) == 0 then
            redis.call('hset', key, owner, 1)
            redis.call('pexpire', key, ttl)
            return nil
        end

        -- Same owner: stack a nested hold and refresh the lease
        if redis.call('hexists', key, owner) == 1 then
            redis.call('hincrby', key, owner, 1)
            redis.call('pexpire', key, ttl)
            return nil
        end

        -- Held by someone else
        return redis.call('pttl', key)
    "#,
    )
});

/// Renew-if-Owner. Returns 1 when the TTL was extended, 0 when the record is
/// absent, expired, or owned by another token.
pub static RENEW_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local ttl = ARGV[1]
        local owner = ARGV[2]

        if redis.call('hexists', key, owner) == 1 then
            redis.call('pexpire', key, ttl)
            return 1
        end

        return 0
    "#,
    )
});

/// Release-or-Decrement. Returns nil when the caller is not the holder, 0 when
/// a nested hold remains, 1 when the record was deleted. The TTL is never
/// refreshed here: expiry only advances through acquire and renew.
pub static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local owner = ARGV[1]

        if redis.call('hexists', key, owner) == 0 then
            return nil
        end

        local counter = redis.call('hincrby', key, owner, -1)
        if counter > 0 then
            return 0
        end

        redis.call('del', key)
        return 1
    "#,
    )
});
