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

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};

/// Async renewal task bound to one acquired lease.
///
/// Same state machine as the blocking watchdog: the first renewal fires one
/// full period after the lease was taken, a failed renewal is terminal, and
/// an explicit stop wins over any pending tick.
pub struct AsyncRenewalWatchdog {
    cancelled: Arc<AtomicBool>,
    stop_tx: watch::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl AsyncRenewalWatchdog {
    pub fn spawn<F, Fut>(period: Duration, renew: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(());
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !renew().await {
                            flag.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                    _ = stop_rx.changed() => {
                        break;
                    }
                }
            }
        });

        Self {
            cancelled,
            stop_tx,
            handle,
        }
    }

    /// Cancel the task and wait for it to wind down. An in-flight renewal
    /// completes; no further tick runs after it.
    pub async fn stop(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_first_renewal_waits_one_period() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let watchdog = AsyncRenewalWatchdog::spawn(Duration::from_millis(100), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(100)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 1);

        watchdog.stop().await;
    }

    #[tokio::test]
    async fn test_failed_renewal_cancels() {
        let watchdog =
            AsyncRenewalWatchdog::spawn(Duration::from_millis(20), || async { false });
        sleep(Duration::from_millis(80)).await;
        assert!(watchdog.is_cancelled());
        watchdog.stop().await;
    }

    #[tokio::test]
    async fn test_stop_halts_ticks() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let watchdog = AsyncRenewalWatchdog::spawn(Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        sleep(Duration::from_millis(50)).await;
        watchdog.stop().await;
        let after_stop = ticks.load(Ordering::SeqCst);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}
