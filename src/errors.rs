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

use redis::RedisError;
use thiserror::Error;

pub type RedleaseResult<T> = std::result::Result<T, RedleaseError>;

#[derive(Error, Debug)]
pub enum RedleaseError {
    #[error("Redis error: {0}")]
    RedisError(#[from] RedisError),

    /// Acquisition wait time exhausted. Carries the message configured on the
    /// failing request, not a generic string.
    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Async runtime error: {0}")]
    AsyncError(String),
}

impl From<r2d2::Error> for RedleaseError {
    fn from(err: r2d2::Error) -> Self {
        RedleaseError::PoolError(err.to_string())
    }
}

impl From<deadpool::managed::PoolError<RedisError>> for RedleaseError {
    fn from(err: deadpool::managed::PoolError<RedisError>) -> Self {
        RedleaseError::PoolError(err.to_string())
    }
}

impl From<deadpool::managed::BuildError> for RedleaseError {
    fn from(err: deadpool::managed::BuildError) -> Self {
        RedleaseError::PoolError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RedleaseError {
    fn from(err: tokio::task::JoinError) -> Self {
        RedleaseError::AsyncError(err.to_string())
    }
}
