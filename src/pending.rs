//! Tracker for in-flight remote-originated structural mutations.
//!
//! Structural messages (attach/detach) can interleave at await points, so each
//! handler registers a [`ChangeTicket`] up front and waits for every ticket
//! registered *before* it to settle before mutating the tree. Tickets
//! registered later never block an earlier one, which gives FIFO causal
//! ordering without a global lock. Settlement happens on drop, so a handler
//! that bails out early (missing tab, error) can never wedge the queue.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Entry {
    seq: u64,
    rx: watch::Receiver<bool>,
}

struct Inner {
    entries: Mutex<Vec<Entry>>,
    next_seq: AtomicU64,
}

/// Set of outstanding structural changes, shared by all router handlers.
#[derive(Clone)]
pub struct PendingChanges {
    inner: Arc<Inner>,
}

impl Default for PendingChanges {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingChanges {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    /// Register a new in-flight change. Must be called before the handler's
    /// first await so later messages queue behind it.
    pub fn register(&self) -> ChangeTicket {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(false);
        self.inner.entries.lock().push(Entry { seq, rx });
        log::trace!("registered pending change #{seq}");
        ChangeTicket {
            seq,
            tx: Some(tx),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Wait until every change registered before `ticket` has settled.
    pub async fn wait_prior(&self, ticket: &ChangeTicket) {
        let prior: Vec<watch::Receiver<bool>> = {
            let entries = self.inner.entries.lock();
            entries
                .iter()
                .filter(|entry| entry.seq < ticket.seq)
                .map(|entry| entry.rx.clone())
                .collect()
        };
        for mut rx in prior {
            // A closed channel means the ticket settled and was dropped.
            let _ = rx.wait_for(|settled| *settled).await;
        }
    }

    /// Wait until every change currently registered has settled. Changes
    /// registered after this call do not extend the wait.
    pub async fn wait_all_settled(&self) {
        let current: Vec<watch::Receiver<bool>> = {
            let entries = self.inner.entries.lock();
            entries.iter().map(|entry| entry.rx.clone()).collect()
        };
        for mut rx in current {
            let _ = rx.wait_for(|settled| *settled).await;
        }
    }

    /// Number of unsettled changes.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether no change is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordering token for one in-flight structural change.
///
/// Settles when [`complete`](Self::complete) is called or the ticket is
/// dropped, whichever comes first.
pub struct ChangeTicket {
    seq: u64,
    tx: Option<watch::Sender<bool>>,
    inner: Arc<Inner>,
}

impl ChangeTicket {
    /// Mark the change as applied.
    pub fn complete(mut self) {
        self.settle();
    }

    fn settle(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(true);
            self.inner
                .entries
                .lock()
                .retain(|entry| entry.seq != self.seq);
            log::trace!("settled pending change #{}", self.seq);
        }
    }
}

impl Drop for ChangeTicket {
    fn drop(&mut self) {
        self.settle();
    }
}
