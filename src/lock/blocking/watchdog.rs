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
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Background renewal task bound to one acquired lease.
///
/// The loop sleeps a full period before the first renewal attempt, then
/// renews once per period. A renewal callback returning false ends the task;
/// so does [`stop`](Self::stop). Both paths land in the same terminal
/// cancelled state and neither can resurrect the task.
pub struct RenewalWatchdog {
    cancelled: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RenewalWatchdog {
    pub fn spawn<F>(period: Duration, renew: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = thread::spawn(move || {
            loop {
                // Sleep in small chunks so a stop is observed promptly
                let mut slept = Duration::ZERO;
                while slept < period {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let chunk = (period - slept).min(Duration::from_millis(25));
                    thread::sleep(chunk);
                    slept += chunk;
                }

                if flag.load(Ordering::SeqCst) {
                    return;
                }

                if !renew() {
                    flag.store(true, Ordering::SeqCst);
                    return;
                }
            }
        });

        Self {
            cancelled,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancel the task. Idempotent; an in-flight renewal attempt is allowed
    /// to complete before the thread exits.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for RenewalWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
