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
    AsyncLockCoordinator, LockContext, LockRequest, RedleaseConfig, RedleaseResult,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> RedleaseResult<()> {
    tracing_subscriber::fmt::init();

    let config = RedleaseConfig::single_server("redis://127.0.0.1:6379").with_pool_size(8);
    let coordinator = AsyncLockCoordinator::new(&config)?;

    // One context per logical task, not per thread
    let ctx = LockContext::new("report-builder");

    let request = LockRequest::new("report:daily")
        .with_wait_time(Duration::from_secs(1))
        .with_lease_time(Duration::from_secs(5))
        .with_message("daily report already running");

    let rows = coordinator
        .with_lock(&ctx, &request, || async {
            // Auto-renewal covers work that outlives the initial lease
            tokio::time::sleep(Duration::from_secs(8)).await;
            1024
        })
        .await?;
    println!("report finished with {} rows", rows);

    // Contending against a held lock fails fast with the configured message
    coordinator.try_lock(&ctx, &request).await?;
    let other = LockContext::new("second-runner");
    if !coordinator.try_lock(&other, &request).await? {
        println!("{}", request.message);
    }
    coordinator.unlock(&ctx, &request).await?;

    Ok(())
}
