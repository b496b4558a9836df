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
use redlease::{
    LockContext, LockCoordinator, LockRequest, MultiLock, RedleaseConfig, RedleaseResult,
};
use std::time::Duration;

fn main() -> RedleaseResult<()> {
    // 1. Create configuration
    let config = RedleaseConfig::single_server("redis://127.0.0.1:6379")
        .with_pool_size(8)
        .with_retry_interval(Duration::from_millis(50));

    // 2. Create the coordinator and an identity for this caller
    let coordinator = LockCoordinator::new(&config)?;
    let ctx = LockContext::current_thread();

    // 3. Guard a critical section; the lease renews itself while we work
    let request = LockRequest::new("order:42")
        .with_wait_time(Duration::from_millis(500))
        .with_lease_time(Duration::from_secs(10))
        .with_message("order 42 is being processed elsewhere");

    let total = coordinator.with_lock(&ctx, &request, || {
        println!("critical section for order 42");
        3 * 14
    })?;
    println!("guarded work returned {}", total);

    // 4. Several locks as one unit
    let batch = MultiLock::new(
        coordinator.clone(),
        vec![
            LockRequest::new("account:alice").with_wait_time(Duration::from_millis(200)),
            LockRequest::new("account:bob").with_wait_time(Duration::from_millis(200)),
        ],
    );
    batch.with_locks(&ctx, || {
        println!("both accounts locked, transferring");
    })?;

    // 5. Manual acquire and release when a closure does not fit
    if coordinator.try_lock(&ctx, &request)? {
        println!(
            "remaining lease: {:?}",
            coordinator.remaining_time("order:42")?
        );
        coordinator.unlock(&ctx, &request)?;
    }

    Ok(())
}
