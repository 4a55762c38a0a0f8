//! Record/replay interception of outgoing calls

mod engine;

use std::sync::atomic::{AtomicUsize, Ordering};

pub use engine::Interceptor;

pub use crate::config::Mode;

impl Mode {
    /// Check if mode is Record
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Mode::Record)
    }

    /// Check if mode is Replay
    #[must_use]
    pub fn is_replay(&self) -> bool {
        matches!(self, Mode::Replay)
    }

    /// Check if mode is PassThrough
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Mode::PassThrough)
    }
}

/// Counters kept by an interceptor
#[derive(Debug, Default)]
pub(crate) struct Counters {
    replayed: AtomicUsize,
    recorded: AtomicUsize,
    passed_through: AtomicUsize,
    misses: AtomicUsize,
}

impl Counters {
    pub(crate) fn replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recorded(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn passed_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn missed(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> InterceptorStats {
        InterceptorStats {
            replayed: self.replayed.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Interceptor statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptorStats {
    /// Calls answered from the store
    pub replayed: usize,
    /// Live calls appended to the store
    pub recorded: usize,
    /// Calls forwarded without touching the store
    pub passed_through: usize,
    /// Lookups that found no matching interaction
    pub misses: usize,
}
