//! Debug override
//!
//! While enabled, the reconciler performs no destructive actions so that
//! finished containers stay around for inspection. Handles are cheap to
//! clone and share one flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DebugOverride {
    enabled: Arc<AtomicBool>,
}

impl DebugOverride {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn get(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Set the flag, returning the previous value
    pub fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let debug = DebugOverride::default();
        let handle = debug.clone();
        assert!(!debug.get());

        assert!(!handle.set(true));
        assert!(debug.get());
        assert!(debug.set(false));
        assert!(!handle.get());
    }
}
