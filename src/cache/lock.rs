//! Poisoned-lock recovery.
//!
//! Session state lives behind `RwLock`s that must stay usable after a panic
//! in another thread; a poisoned guard is recovered and logged rather than
//! propagated.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn_poisoned("read", target, op);
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn_poisoned("write", target, op);
        poisoned.into_inner()
    })
}

fn warn_poisoned(kind: &'static str, target: &'static str, op: &'static str) {
    warn!(
        target_module = target,
        op,
        lock_kind = kind,
        "Recovered from poisoned store lock; state may be stale after a panic elsewhere"
    );
}
