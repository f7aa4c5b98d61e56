//! Cooperative stop signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a presentation layer raises to end a run early.
///
/// The engine polls it between pages, between items and between dialog
/// steps; an in-flight step always finishes first.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_requested());
        handle.request();
        assert!(signal.is_requested());
    }
}
