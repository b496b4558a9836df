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
use deadpool::managed::{Metrics, Object, Pool, RecycleError, RecycleResult};
use deadpool::Runtime;
use redis::aio::ConnectionLike as AsyncConnectionLike;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Client, RedisError};

use crate::config::{ConnectionMode, RedleaseConfig};
use crate::connection::SyncRedisConnectionManager;
use crate::errors::{RedleaseError, RedleaseResult};

type AsyncRedisPool = Pool<AsyncSingleConnectionManager>;
type AsyncClusterPool = Pool<AsyncClusterConnectionManager>;

pub enum AsyncRedisConnection {
    Single(Object<AsyncSingleConnectionManager>),
    Cluster(Object<AsyncClusterConnectionManager>),
}

impl AsyncConnectionLike for AsyncRedisConnection {
    fn req_packed_command<'a>(
        &'a mut self,
        cmd: &'a redis::Cmd,
    ) -> redis::RedisFuture<'a, redis::Value> {
        match self {
            AsyncRedisConnection::Single(conn) => conn.req_packed_command(cmd),
            AsyncRedisConnection::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a redis::Pipeline,
        offset: usize,
        count: usize,
    ) -> redis::RedisFuture<'a, Vec<redis::Value>> {
        match self {
            AsyncRedisConnection::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            AsyncRedisConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            AsyncRedisConnection::Single(conn) => conn.get_db(),
            AsyncRedisConnection::Cluster(conn) => conn.get_db(),
        }
    }
}

pub struct AsyncSingleConnectionManager {
    client: Client,
    database: Option<i64>,
}

impl deadpool::managed::Manager for AsyncSingleConnectionManager {
    type Type = redis::aio::MultiplexedConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        if let Some(db) = self.database {
            redis::cmd("SELECT").arg(db).query_async::<()>(&mut conn).await?;
        }

        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _metrics: &Metrics,
    ) -> RecycleResult<Self::Error> {
        // Check that the connection is still valid
        match redis::cmd("PING").query_async::<String>(conn).await {
            Ok(pong) if pong == "PONG" => Ok(()),
            Ok(_) => Err(RecycleError::Message("Invalid PONG response".into())),
            Err(e) => Err(RecycleError::Backend(e)),
        }
    }
}

pub struct AsyncClusterConnectionManager {
    client: ClusterClient,
}

impl deadpool::managed::Manager for AsyncClusterConnectionManager {
    type Type = ClusterConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.client.get_async_connection().await
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _metrics: &Metrics,
    ) -> RecycleResult<Self::Error> {
        match redis::cmd("PING").query_async::<String>(conn).await {
            Ok(pong) if pong == "PONG" => Ok(()),
            Ok(_) => Err(RecycleError::Message("Invalid PONG response".into())),
            Err(e) => Err(RecycleError::Backend(e)),
        }
    }
}

// Asynchronous pooled connection manager
pub struct AsyncRedisConnectionManager {
    single_pool: Option<AsyncRedisPool>,
    cluster_pool: Option<AsyncClusterPool>,
}

impl AsyncRedisConnectionManager {
    pub fn new(config: &RedleaseConfig) -> RedleaseResult<Self> {
        config.validate()?;

        match &config.connection_mode {
            ConnectionMode::SingleServer { .. } => {
                let client = SyncRedisConnectionManager::create_single_client(config)?;
                let manager = AsyncSingleConnectionManager {
                    client,
                    database: config.database,
                };
                let pool = Pool::builder(manager)
                    .max_size(config.pool_size as usize)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()?;
                Ok(Self {
                    single_pool: Some(pool),
                    cluster_pool: None,
                })
            }
            ConnectionMode::Cluster { .. } => {
                let client = SyncRedisConnectionManager::create_cluster_client(config)?;
                let manager = AsyncClusterConnectionManager { client };
                let pool = Pool::builder(manager)
                    .max_size(config.pool_size as usize)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()?;
                Ok(Self {
                    single_pool: None,
                    cluster_pool: Some(pool),
                })
            }
        }
    }

    pub async fn get_connection(&self) -> RedleaseResult<AsyncRedisConnection> {
        if let Some(pool) = &self.single_pool {
            return Ok(AsyncRedisConnection::Single(pool.get().await?));
        }
        if let Some(pool) = &self.cluster_pool {
            return Ok(AsyncRedisConnection::Cluster(pool.get().await?));
        }
        Err(RedleaseError::PoolError(
            "no connection available".to_string(),
        ))
    }

    pub async fn health_check(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => matches!(
                redis::cmd("PING").query_async::<String>(&mut conn).await,
                Ok(response) if response == "PONG"
            ),
            Err(_) => false,
        }
    }
}
