//! Debounced layout recomputation.
//!
//! Registry churn arrives in bursts (a subtree collapse fires one event per
//! descendant), so layout work is reserved rather than run inline: reasons
//! accumulate with OR, the longest requested delay wins, and the single flush
//! carries everything. While tab restores are in flight the flush keeps
//! re-arming, since intermediate layouts would be thrown away anyway.

use crate::events::EventEmitter;
use crate::restoring::RestoringTabs;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Reason bits for a reserved layout update.
pub mod reasons {
    pub const RESIZE: u32 = 1 << 0;
    pub const COLLAPSE: u32 = 1 << 1;
    pub const EXPAND: u32 = 1 << 2;
    pub const TAB_OPEN: u32 = 1 << 3;
    pub const TAB_CLOSE: u32 = 1 << 4;
    pub const TAB_MOVE: u32 = 1 << 5;
    pub const ANIMATION_END: u32 = 1 << 6;
}

/// Payload of a flushed layout update: the OR of every reserved reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutUpdate {
    pub reasons: u32,
}

struct PendingLayout {
    reasons: u32,
    delay: Duration,
    task: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    pending: Mutex<PendingLayout>,
    restoring: RestoringTabs,
    retry_delay: Duration,
    on_layout: EventEmitter<LayoutUpdate>,
}

/// Coalesces layout update requests into single deferred flushes.
#[derive(Clone)]
pub struct LayoutScheduler {
    inner: Arc<SchedulerInner>,
}

impl LayoutScheduler {
    /// `retry_delay` is the re-arm interval while restores are in flight;
    /// anything under 100ms just burns wakeups, so it is clamped up.
    pub fn new(restoring: RestoringTabs, retry_delay: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                pending: Mutex::new(PendingLayout {
                    reasons: 0,
                    delay: Duration::ZERO,
                    task: None,
                }),
                restoring,
                retry_delay: retry_delay.max(Duration::from_millis(100)),
                on_layout: EventEmitter::new(),
            }),
        }
    }

    /// Fires once per flush with the accumulated reasons.
    pub fn on_layout(&self) -> &EventEmitter<LayoutUpdate> {
        &self.inner.on_layout
    }

    /// Reserve a layout update. Merges with any pending reservation: reasons
    /// OR together and the longer delay wins, so a flush never runs earlier
    /// than its slowest contributor asked for.
    pub fn reserve(&self, reasons: u32, delay: Duration) {
        let inner = self.inner.clone();
        let mut pending = self.inner.pending.lock();
        pending.reasons |= reasons;
        pending.delay = pending.delay.max(delay);
        let delay = pending.delay;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        pending.task = Some(tokio::spawn(async move {
            flush_after(inner, delay).await;
        }));
    }

    /// Reasons accumulated but not yet flushed.
    pub fn pending_reasons(&self) -> u32 {
        self.inner.pending.lock().reasons
    }
}

async fn flush_after(inner: Arc<SchedulerInner>, delay: Duration) {
    tokio::time::sleep(delay).await;
    while inner.restoring.has_restoring_tabs() {
        log::debug!(
            "layout deferred, {} tabs still restoring",
            inner.restoring.count()
        );
        tokio::time::sleep(inner.retry_delay).await;
    }
    let reasons = {
        let mut pending = inner.pending.lock();
        let reasons = pending.reasons;
        pending.reasons = 0;
        pending.delay = Duration::ZERO;
        pending.task = None;
        reasons
    };
    if reasons != 0 {
        inner.on_layout.dispatch(&LayoutUpdate { reasons });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_flushes(scheduler: &LayoutScheduler) -> Arc<Mutex<Vec<u32>>> {
        let flushes = Arc::new(Mutex::new(Vec::new()));
        let sink = flushes.clone();
        scheduler
            .on_layout()
            .subscribe(move |update: &LayoutUpdate| sink.lock().push(update.reasons));
        flushes
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_coalesce_into_one_flush() {
        let scheduler = LayoutScheduler::new(RestoringTabs::new(), Duration::from_millis(100));
        let flushes = collect_flushes(&scheduler);

        scheduler.reserve(reasons::COLLAPSE, Duration::from_millis(10));
        scheduler.reserve(reasons::TAB_MOVE, Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let flushes = flushes.lock();
        assert_eq!(flushes.len(), 1, "bursts collapse into one update");
        assert_eq!(flushes[0], reasons::COLLAPSE | reasons::TAB_MOVE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_longer_delay_wins() {
        let scheduler = LayoutScheduler::new(RestoringTabs::new(), Duration::from_millis(100));
        let flushes = collect_flushes(&scheduler);

        scheduler.reserve(reasons::RESIZE, Duration::from_millis(500));
        scheduler.reserve(reasons::TAB_OPEN, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            flushes.lock().is_empty(),
            "the 500ms reservation holds the flush back"
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(flushes.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_deferred_while_tabs_restore() {
        let restoring = RestoringTabs::new();
        let scheduler = LayoutScheduler::new(restoring.clone(), Duration::from_millis(100));
        let flushes = collect_flushes(&scheduler);

        restoring.increment();
        scheduler.reserve(reasons::TAB_OPEN, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(flushes.lock().is_empty(), "no layout while restoring");

        restoring.decrement();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(flushes.lock().len(), 1, "flush resumes after restore ends");
    }
}
