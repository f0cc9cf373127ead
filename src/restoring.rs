//! Counter for tabs currently being restored by the browser session store.
//!
//! The background signals `notify-tab-restoring` / `notify-tab-restored` for
//! every tab the browser recreates. While the count is positive the layout
//! scheduler defers recomputes so a batch restore doesn't thrash the layout
//! once per tab.

use parking_lot::Mutex;
use std::sync::Arc;

/// Shared non-negative count of in-flight tab restorations.
#[derive(Clone, Default)]
pub struct RestoringTabs {
    count: Arc<Mutex<u32>>,
}

impl RestoringTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tab restoration started.
    pub fn increment(&self) {
        let mut count = self.count.lock();
        *count += 1;
        log::debug!("restoring tab count incremented to {}", *count);
    }

    /// A tab restoration finished. Saturates at zero; a decrement without a
    /// matching increment indicates a protocol hiccup and is only logged.
    pub fn decrement(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            log::warn!("restoring tab count decremented below zero, ignoring");
            return;
        }
        *count -= 1;
        log::debug!("restoring tab count decremented to {}", *count);
    }

    /// Current count.
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    /// Whether any restoration is still outstanding.
    pub fn has_restoring_tabs(&self) -> bool {
        self.count() > 0
    }
}
