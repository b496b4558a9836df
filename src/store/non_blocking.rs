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
use std::sync::Arc;
use std::time::Duration;

use crate::connection::AsyncRedisConnectionManager;
use crate::errors::RedleaseResult;
use crate::scripts;
use crate::store::{AcquireOutcome, AsyncLeaseStore, ReleaseOutcome};

/// Async lease operations over Redis.
pub struct AsyncRedisLeaseStore {
    connection_manager: Arc<AsyncRedisConnectionManager>,
}

impl AsyncRedisLeaseStore {
    pub fn new(connection_manager: Arc<AsyncRedisConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[async_trait]
impl AsyncLeaseStore for AsyncRedisLeaseStore {
    async fn acquire_or_increment(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<AcquireOutcome> {
        let mut conn = self.connection_manager.get_connection().await?;

        let pttl: Option<i64> = scripts::ACQUIRE_SCRIPT
            .key(key)
            .arg(lease.as_millis() as i64)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        Ok(match pttl {
            None => AcquireOutcome::Acquired,
            Some(ms) => AcquireOutcome::Held {
                remaining_ttl: Duration::from_millis(ms.max(0) as u64),
            },
        })
    }

    async fn renew_if_owner(
        &self,
        key: &str,
        lease: Duration,
        owner: &str,
    ) -> RedleaseResult<bool> {
        let mut conn = self.connection_manager.get_connection().await?;

        let renewed: i64 = scripts::RENEW_SCRIPT
            .key(key)
            .arg(lease.as_millis() as i64)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        Ok(renewed == 1)
    }

    async fn release_or_decrement(
        &self,
        key: &str,
        owner: &str,
    ) -> RedleaseResult<ReleaseOutcome> {
        let mut conn = self.connection_manager.get_connection().await?;

        let released: Option<i64> = scripts::RELEASE_SCRIPT
            .key(key)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        Ok(match released {
            None => ReleaseOutcome::Absent,
            Some(1) => ReleaseOutcome::Released,
            Some(_) => ReleaseOutcome::StillHeld,
        })
    }

    async fn force_clear(&self, key: &str) -> RedleaseResult<bool> {
        let mut conn = self.connection_manager.get_connection().await?;
        let deleted: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(deleted > 0)
    }

    async fn remaining_ttl(&self, key: &str) -> RedleaseResult<Option<Duration>> {
        let mut conn = self.connection_manager.get_connection().await?;
        let ttl_ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;

        if ttl_ms > 0 {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        } else {
            Ok(None)
        }
    }
}
