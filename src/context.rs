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
use std::sync::Arc;
use uuid::Uuid;

use crate::util::thread_label;

/// Identity of one logical caller.
///
/// A context is the unit the coordinator treats as a single lock holder:
/// nested reentrant acquisitions through the same context resolve to the same
/// owner token and stack onto one lease. Contexts are explicit objects rather
/// than ambient thread state, so one can be carried across await points or
/// handed to a worker thread. Clones share the same identity slot.
pub struct LockContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    label: String,
    token: Mutex<Option<String>>,
}

impl LockContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                label: label.into(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Context labeled after the calling thread, the common choice for
    /// blocking callers.
    pub fn current_thread() -> Self {
        Self::new(thread_label())
    }

    /// Owner token for the next lease operation.
    ///
    /// Reentrant requests reuse the pinned token when one is present and pin a
    /// fresh one otherwise. Non-reentrant requests always get a fresh token,
    /// which is never pinned: a nested non-reentrant acquisition must contend
    /// like any other caller.
    pub(crate) fn resolve(&self, reentrant: bool) -> String {
        let mut slot = self.inner.token.lock();
        if reentrant {
            if let Some(token) = slot.as_ref() {
                return token.clone();
            }
        }
        let token = format!("{}:{}", Uuid::new_v4().simple(), self.inner.label);
        if reentrant {
            *slot = Some(token.clone());
        }
        token
    }

    /// Drop the pinned token. Called when the outermost hold is released or
    /// when a lease operation proves ownership was lost.
    pub(crate) fn clear(&self) {
        self.inner.token.lock().take();
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner.token.lock().clone()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl Clone for LockContext {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_resolve_is_stable() {
        let ctx = LockContext::new("worker-1");
        let first = ctx.resolve(true);
        let second = ctx.resolve(true);
        assert_eq!(first, second);
        assert_eq!(ctx.current_token(), Some(first));
    }

    #[test]
    fn test_non_reentrant_resolve_is_unique_and_unpinned() {
        let ctx = LockContext::new("worker-2");
        let first = ctx.resolve(false);
        let second = ctx.resolve(false);
        assert_ne!(first, second);
        assert_eq!(ctx.current_token(), None);
    }

    #[test]
    fn test_distinct_contexts_get_distinct_tokens() {
        let a = LockContext::new("a");
        let b = LockContext::new("b");
        assert_ne!(a.resolve(true), b.resolve(true));
    }

    #[test]
    fn test_clear_forces_fresh_token() {
        let ctx = LockContext::current_thread();
        let first = ctx.resolve(true);
        ctx.clear();
        assert_eq!(ctx.current_token(), None);
        assert_ne!(first, ctx.resolve(true));
    }

    #[test]
    fn test_clones_share_identity() {
        let ctx = LockContext::new("shared");
        let token = ctx.resolve(true);
        let clone = ctx.clone();
        assert_eq!(clone.resolve(true), token);
        clone.clear();
        assert_eq!(ctx.current_token(), None);
    }
}
