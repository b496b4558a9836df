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
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{RedleaseError, RedleaseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionMode {
    SingleServer {
        url: String,
        host: Option<String>,
        port: Option<u16>,
    },
    Cluster {
        node_addresses: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedleaseConfig {
    /// Connection mode
    pub connection_mode: ConnectionMode,
    /// Connection pool size
    pub pool_size: u32,
    /// Connection timeout time
    pub connection_timeout: Duration,
    /// Response timeout time
    pub response_timeout: Duration,
    /// Connection maximum lifetime
    pub max_lifetime: Duration,
    /// Connection idle time out
    pub idle_timeout: Duration,
    /// User name
    pub username: Option<String>,
    /// PASSWORD
    pub password: Option<String>,
    /// Database number
    pub database: Option<i64>,
    /// Namespace prefix applied to every lock key
    pub key_prefix: String,
    /// Delay between acquisition attempts while waiting for a held lock
    pub retry_interval: Duration,
}

impl Default for RedleaseConfig {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::SingleServer {
                url: "".to_string(),
                host: Some("localhost".to_string()),
                port: Some(6379),
            },
            pool_size: 10,
            connection_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(3),
            max_lifetime: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
            username: None,
            password: None,
            database: Some(0),
            key_prefix: "LK_".to_string(),
            retry_interval: Duration::from_millis(50),
        }
    }
}

impl RedleaseConfig {
    pub fn single_server(address: &str) -> Self {
        Self {
            connection_mode: ConnectionMode::SingleServer {
                url: address.to_string(),
                host: None,
                port: None,
            },
            ..Default::default()
        }
    }

    pub fn cluster(node_addresses: Vec<String>) -> Self {
        Self {
            connection_mode: ConnectionMode::Cluster { node_addresses },
            ..Default::default()
        }
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_database(mut self, db: i64) -> Self {
        self.database = Some(db);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> RedleaseResult<()> {
        if self.pool_size == 0 {
            return Err(RedleaseError::ConfigError(
                "Pool size cannot be zero".to_string(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(RedleaseError::ConfigError(
                "Retry interval cannot be zero".to_string(),
            ));
        }

        match &self.connection_mode {
            ConnectionMode::SingleServer { url, host, port } => {
                if url.is_empty() && (host.is_none() || port.is_none()) {
                    return Err(RedleaseError::ConfigError(
                        "Single server mode requires either URL or host/port".to_string(),
                    ));
                }
            }
            ConnectionMode::Cluster { node_addresses } => {
                if node_addresses.is_empty() {
                    return Err(RedleaseError::ConfigError(
                        "Cluster mode requires at least one node address".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RedleaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let config = RedleaseConfig::default().with_pool_size(0);
        assert!(matches!(
            config.validate(),
            Err(RedleaseError::ConfigError(_))
        ));
    }

    #[test]
    fn test_cluster_without_nodes_rejected() {
        let config = RedleaseConfig::cluster(Vec::new());
        assert!(matches!(
            config.validate(),
            Err(RedleaseError::ConfigError(_))
        ));
    }
}
