//! One-shot guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lets an action run at most once per lifetime. A new session gets a new
/// latch; there is no reset.
#[derive(Debug, Default)]
pub struct Latch {
    fired: AtomicBool,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once, for the first caller.
    pub fn trigger(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
