//! Commit-time sources.
//!
//! The registry never reads the clock itself; hosts build a [`CallContext`]
//! from one of these and hand it to each write.

use crate::types::{CallContext, Identity, Timestamp};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.now.store(at, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

impl CallContext {
    /// Build a context from `clock`, never earlier than `floor`.
    ///
    /// Passing the registry's last commit time as `floor` keeps commit times
    /// non-decreasing across wall-clock regressions and process restarts.
    pub fn from_clock(
        caller: impl Into<Identity>,
        clock: &dyn Clock,
        floor: Option<Timestamp>,
    ) -> Self {
        let now = clock.now();
        CallContext::new(caller, floor.map_or(now, |f| now.max(f)))
    }
}
