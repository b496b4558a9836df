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
mod non_blocking;

pub use blocking::*;
pub use non_blocking::*;

use std::time::Duration;

use crate::errors::{RedleaseError, RedleaseResult};

pub const DEFAULT_LEASE_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_BUSY_MESSAGE: &str = "system busy, please retry later";

/// One lock acquisition, fully described.
///
/// `wait_time` of zero means a single attempt with no retry. `message` is
/// what the guard surfaces to the caller when that wait is exhausted.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub key: String,
    pub wait_time: Duration,
    pub message: String,
    pub lease_time: Duration,
    pub reentrant: bool,
    pub auto_renew: bool,
}

impl LockRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            wait_time: Duration::ZERO,
            message: DEFAULT_BUSY_MESSAGE.to_string(),
            lease_time: DEFAULT_LEASE_TIME,
            reentrant: true,
            auto_renew: true,
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn with_lease_time(mut self, lease_time: Duration) -> Self {
        self.lease_time = lease_time;
        self
    }

    pub fn with_reentrant(mut self, reentrant: bool) -> Self {
        self.reentrant = reentrant;
        self
    }

    pub fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    pub(crate) fn validate(&self) -> RedleaseResult<()> {
        if self.key.is_empty() {
            return Err(RedleaseError::ConfigError(
                "Lock key cannot be empty".to_string(),
            ));
        }
        if self.lease_time.is_zero() {
            return Err(RedleaseError::ConfigError(
                "Lease time must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let request = LockRequest::new("k");
        assert_eq!(request.wait_time, Duration::ZERO);
        assert_eq!(request.lease_time, Duration::from_secs(60));
        assert!(request.reentrant);
        assert!(request.auto_renew);
        assert_eq!(request.message, DEFAULT_BUSY_MESSAGE);
    }

    #[test]
    fn test_empty_key_fails_fast() {
        assert!(LockRequest::new("").validate().is_err());
    }

    #[test]
    fn test_zero_lease_fails_fast() {
        let request = LockRequest::new("k").with_lease_time(Duration::ZERO);
        assert!(request.validate().is_err());
    }
}
