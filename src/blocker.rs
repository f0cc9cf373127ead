//! Reentrant gate that suspends user-visible interaction while the view is in
//! an inconsistent intermediate state.
//!
//! Each [`BlockReason`] carries its own refcount; interaction stays blocked
//! while any count is positive. The presentation layer subscribes to the
//! blocked/unblocked edge events to show a throbber and swallow input.

use crate::events::EventEmitter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Why user operations are currently suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// Initial sidebar load until the registry is ready.
    Startup,
    /// Multi-tab session restore in progress.
    SessionRestore,
    /// The background process requested a block around a bulk operation.
    RemoteOperation,
}

impl BlockReason {
    /// Whether this reason should surface a visible throbber.
    pub fn shows_throbber(self) -> bool {
        matches!(self, BlockReason::Startup | BlockReason::SessionRestore)
    }
}

/// Edge event payload: the gate transitioned between blocked and unblocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStateChange {
    pub blocked: bool,
    pub throbber: bool,
}

#[derive(Default)]
struct BlockerState {
    counts: HashMap<BlockReason, usize>,
    total: usize,
}

/// Process-wide reentrant user-operation gate.
#[derive(Clone)]
pub struct UserOperationBlocker {
    state: Arc<Mutex<BlockerState>>,
    /// Fired on every blocked/unblocked edge, never on nested block calls.
    pub on_change: EventEmitter<BlockStateChange>,
}

impl Default for UserOperationBlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl UserOperationBlocker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BlockerState::default())),
            on_change: EventEmitter::new(),
        }
    }

    /// Engage the gate for a reason. Reentrant: every `block` must be paired
    /// with one `unblock` for the same reason.
    pub fn block(&self, reason: BlockReason) {
        let change = {
            let mut state = self.state.lock();
            *state.counts.entry(reason).or_insert(0) += 1;
            state.total += 1;
            if state.total == 1 {
                Some(BlockStateChange {
                    blocked: true,
                    throbber: throbber_active(&state),
                })
            } else {
                None
            }
        };
        log::debug!("user operations blocked ({reason:?})");
        if let Some(change) = change {
            self.on_change.dispatch(&change);
        }
    }

    /// Release one engagement of the gate for a reason. Unbalanced unblocks
    /// are logged and ignored.
    pub fn unblock(&self, reason: BlockReason) {
        let change = {
            let mut state = self.state.lock();
            match state.counts.get_mut(&reason) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    if *count == 0 {
                        state.counts.remove(&reason);
                    }
                    state.total -= 1;
                }
                _ => {
                    log::warn!("unblock({reason:?}) without a matching block, ignoring");
                    return;
                }
            }
            if state.total == 0 {
                Some(BlockStateChange {
                    blocked: false,
                    throbber: false,
                })
            } else {
                None
            }
        };
        log::debug!("user operations unblocked ({reason:?})");
        if let Some(change) = change {
            self.on_change.dispatch(&change);
        }
    }

    /// Engage the gate and return a guard that releases it on drop, so every
    /// exit path (including errors and panics) unblocks.
    pub fn block_scoped(&self, reason: BlockReason) -> BlockGuard {
        self.block(reason);
        BlockGuard {
            blocker: self.clone(),
            reason,
            released: false,
        }
    }

    /// Whether any reason currently holds the gate.
    pub fn is_blocked(&self) -> bool {
        self.state.lock().total > 0
    }

    /// Whether a throbber-displaying reason currently holds the gate.
    pub fn shows_throbber(&self) -> bool {
        throbber_active(&self.state.lock())
    }

    /// The set of reasons with a positive count.
    pub fn active_reasons(&self) -> Vec<BlockReason> {
        self.state.lock().counts.keys().copied().collect()
    }
}

fn throbber_active(state: &BlockerState) -> bool {
    state.counts.keys().any(|reason| reason.shows_throbber())
}

/// RAII release for [`UserOperationBlocker::block_scoped`].
pub struct BlockGuard {
    blocker: UserOperationBlocker,
    reason: BlockReason,
    released: bool,
}

impl BlockGuard {
    /// Release the block now instead of at drop time.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.blocker.unblock(self.reason);
        }
    }
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
