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
use r2d2::{Pool, PooledConnection};
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::{
    Client, ConnectionAddr, ConnectionInfo, ConnectionLike, IntoConnectionInfo,
    RedisConnectionInfo,
};
use std::sync::Arc;

use crate::config::{ConnectionMode, RedleaseConfig};
use crate::errors::{RedleaseError, RedleaseResult};

type RedisPool = Pool<Client>;
type ClusterRedisPool = Pool<ClusterClient>;

pub enum RedisConnection {
    Single(PooledConnection<Client>),
    Cluster(PooledConnection<ClusterClient>),
}

// Implement the ConnectionLike trait for uniform usage
impl ConnectionLike for RedisConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> redis::RedisResult<redis::Value> {
        match self {
            RedisConnection::Single(conn) => conn.req_packed_command(cmd),
            RedisConnection::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> redis::RedisResult<Vec<redis::Value>> {
        match self {
            RedisConnection::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            RedisConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            RedisConnection::Single(conn) => conn.get_db(),
            RedisConnection::Cluster(conn) => conn.get_db(),
        }
    }

    fn check_connection(&mut self) -> bool {
        match self {
            RedisConnection::Single(conn) => conn.check_connection(),
            RedisConnection::Cluster(conn) => conn.check_connection(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            RedisConnection::Single(conn) => conn.is_open(),
            RedisConnection::Cluster(conn) => conn.is_open(),
        }
    }
}

// Synchronous pooled connection manager
pub struct SyncRedisConnectionManager {
    single_pool: Option<Arc<RedisPool>>,
    cluster_pool: Option<Arc<ClusterRedisPool>>,
}

impl SyncRedisConnectionManager {
    pub fn new(config: &RedleaseConfig) -> RedleaseResult<Self> {
        config.validate()?;

        match &config.connection_mode {
            ConnectionMode::SingleServer { .. } => {
                let client = Self::create_single_client(config)?;
                let pool = Self::build_pool(client, config)?;
                Ok(Self {
                    single_pool: Some(Arc::new(pool)),
                    cluster_pool: None,
                })
            }
            ConnectionMode::Cluster { .. } => {
                let client = Self::create_cluster_client(config)?;
                let pool = Self::build_pool(client, config)?;
                Ok(Self {
                    single_pool: None,
                    cluster_pool: Some(Arc::new(pool)),
                })
            }
        }
    }

    pub fn get_connection(&self) -> RedleaseResult<RedisConnection> {
        if let Some(pool) = &self.single_pool {
            return Ok(RedisConnection::Single(pool.get()?));
        }
        if let Some(pool) = &self.cluster_pool {
            return Ok(RedisConnection::Cluster(pool.get()?));
        }
        Err(RedleaseError::PoolError(
            "no connection available".to_string(),
        ))
    }

    /// Simple health check: PING
    pub fn health_check(&self) -> bool {
        match self.get_connection() {
            Ok(mut conn) => matches!(
                redis::cmd("PING").query::<String>(&mut conn),
                Ok(response) if response == "PONG"
            ),
            Err(_) => false,
        }
    }

    pub(crate) fn create_single_client(config: &RedleaseConfig) -> RedleaseResult<Client> {
        match &config.connection_mode {
            ConnectionMode::SingleServer { url, host, port } => {
                let conn_info = if !url.is_empty() {
                    Self::connection_info_from_url(url, config)?
                } else if let (Some(host), Some(port)) = (host, port) {
                    Self::connection_info_from_host_port(host, *port, config)
                } else {
                    return Err(RedleaseError::ConfigError(
                        "Single server mode requires either URL or host/port".to_string(),
                    ));
                };

                Client::open(conn_info).map_err(|e| RedleaseError::PoolError(e.to_string()))
            }
            _ => Err(RedleaseError::ConfigError(
                "Expected single server mode".to_string(),
            )),
        }
    }

    fn connection_info_from_url(
        url: &str,
        config: &RedleaseConfig,
    ) -> RedleaseResult<ConnectionInfo> {
        let mut conn_info: ConnectionInfo = url
            .into_connection_info()
            .map_err(|e| RedleaseError::PoolError(e.to_string()))?;

        // Credentials on the config win over the ones embedded in the URL
        if config.username.is_some() {
            conn_info.redis.username = config.username.clone();
        }
        if config.password.is_some() {
            conn_info.redis.password = config.password.clone();
        }
        if let Some(db) = config.database {
            conn_info.redis.db = db;
        }
        Ok(conn_info)
    }

    fn connection_info_from_host_port(
        host: &str,
        port: u16,
        config: &RedleaseConfig,
    ) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db: config.database.unwrap_or(0),
                username: config.username.clone(),
                password: config.password.clone(),
                ..Default::default()
            },
        }
    }

    pub(crate) fn create_cluster_client(config: &RedleaseConfig) -> RedleaseResult<ClusterClient> {
        match &config.connection_mode {
            ConnectionMode::Cluster { node_addresses } => {
                let mut builder = ClusterClientBuilder::new(node_addresses.clone());

                if let Some(username) = &config.username {
                    builder = builder.username(username.clone());
                }
                if let Some(password) = &config.password {
                    builder = builder.password(password.clone());
                }
                builder = builder.connection_timeout(config.connection_timeout);
                builder = builder.response_timeout(config.response_timeout);

                builder
                    .build()
                    .map_err(|e| RedleaseError::PoolError(e.to_string()))
            }
            _ => Err(RedleaseError::ConfigError(
                "Expected cluster mode".to_string(),
            )),
        }
    }

    fn build_pool<T>(client: T, config: &RedleaseConfig) -> RedleaseResult<Pool<T>>
    where
        T: r2d2::ManageConnection,
    {
        Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .max_lifetime(Some(config.max_lifetime))
            .idle_timeout(Some(config.idle_timeout))
            .test_on_check_out(true)
            .build(client)
            .map_err(|e| RedleaseError::PoolError(e.to_string()))
    }
}
