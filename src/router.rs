//! Message dispatch.
//!
//! One router instance serves one window. Window-scoped messages for other
//! windows are dropped before any work happens; the restoring counters,
//! favicon updates and state broadcasts are global and always apply.
//!
//! Structural handlers follow a fixed discipline: register an ordering ticket
//! synchronously on arrival, wait for earlier tickets to settle, wait
//! (bounded) for the tabs the message references, then mutate. A handler that
//! bails out still settles its ticket via drop, so one missing tab never
//! wedges the queue.

use crate::blocker::{BlockReason, UserOperationBlocker};
use crate::host::CloseConfirmer;
use crate::layout::{reasons, LayoutScheduler};
use crate::messages::{parse_message, Message, Response};
use crate::pending::PendingChanges;
use crate::restoring::RestoringTabs;
use crate::tab::TabRegistry;
use crate::tree;
use arbor_config::{ConfigHandle, TabId, WindowId};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

/// Routes inbound messages to registry mutations for one window.
pub struct MessageRouter<C> {
    registry: TabRegistry,
    config: ConfigHandle,
    blocker: UserOperationBlocker,
    pending: PendingChanges,
    restoring: RestoringTabs,
    layout: LayoutScheduler,
    confirmer: Arc<C>,
    /// Fired when the background pings us, which doubles as its readiness
    /// announcement during startup.
    background_ready: Arc<Notify>,
}

impl<C: CloseConfirmer> MessageRouter<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: TabRegistry,
        config: ConfigHandle,
        blocker: UserOperationBlocker,
        pending: PendingChanges,
        restoring: RestoringTabs,
        layout: LayoutScheduler,
        confirmer: Arc<C>,
        background_ready: Arc<Notify>,
    ) -> Self {
        Self {
            registry,
            config,
            blocker,
            pending,
            restoring,
            layout,
            confirmer,
            background_ready,
        }
    }

    /// Parse and dispatch a raw JSON message. Unknown message types and
    /// messages for other windows produce no response.
    pub async fn handle_raw(&self, value: &serde_json::Value) -> Option<Response> {
        let message = parse_message(value)?;
        self.handle(message).await
    }

    /// Dispatch one parsed message.
    pub async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::PingToSidebar { window_id } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                self.background_ready.notify_waiters();
                Some(Response::Bool(true))
            }

            Message::PushTreeStructure {
                window_id,
                structure,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                tree::apply_tree_structure(&self.registry, &structure);
                ticket.complete();
                self.reserve_layout(reasons::COLLAPSE | reasons::EXPAND);
                None
            }

            Message::NotifyTabRestoring => {
                self.restoring.increment();
                None
            }

            Message::NotifyTabRestored => {
                self.restoring.decrement();
                None
            }

            Message::NotifyTabFaviconUpdated { tab, fav_icon_url } => {
                self.registry.set_favicon(tab, fav_icon_url);
                None
            }

            Message::ChangeSubtreeCollapsedState {
                window_id,
                tab,
                collapsed,
                just_now,
                manual_operation,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                if !self.wait_for_tabs(&[tab]).await {
                    log::debug!("subtree collapse for missing tab {tab}, dropping");
                    return None;
                }
                tree::collapse_expand_subtree(&self.registry, tab, collapsed, manual_operation);
                ticket.complete();
                let reason = if collapsed {
                    reasons::COLLAPSE
                } else {
                    reasons::EXPAND
                };
                if just_now {
                    // Skip the collapse animation delay for instant toggles.
                    self.layout.reserve(reason, self.layout_delay());
                } else {
                    let animation = Duration::from_millis(self.config.get().collapse_duration_ms);
                    self.layout.reserve(reason, animation);
                }
                None
            }

            Message::ChangeTabCollapsedState {
                window_id,
                tab,
                collapsed,
                just_now: _,
                by_ancestor,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                if !self.wait_for_tabs(&[tab]).await {
                    return None;
                }
                // Ancestor-derived broadcasts can be outrun by a newer toggle;
                // apply only while they still describe the current tree.
                if by_ancestor && collapsed != tree::has_collapsed_ancestor(&self.registry, tab) {
                    log::debug!("stale ancestor-derived collapse for {tab}, dropping");
                    return None;
                }
                tree::collapse_expand_tab(&self.registry, tab, collapsed);
                ticket.complete();
                None
            }

            Message::MoveTabsBefore {
                window_id,
                tabs,
                next_tab,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                // The anchor is a referenced tab too; an anchor that never
                // materializes falls through to the move-to-end case.
                let mut referenced = tabs.clone();
                referenced.extend(next_tab);
                self.wait_for_tabs(&referenced).await;
                let moved = self.registry.move_tabs_before(&tabs, next_tab);
                ticket.complete();
                self.reserve_layout(reasons::TAB_MOVE);
                Some(Response::Tabs(moved))
            }

            Message::MoveTabsAfter {
                window_id,
                tabs,
                previous_tab,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                let mut referenced = tabs.clone();
                referenced.extend(previous_tab);
                self.wait_for_tabs(&referenced).await;
                let moved = self.registry.move_tabs_after(&tabs, previous_tab);
                ticket.complete();
                self.reserve_layout(reasons::TAB_MOVE);
                Some(Response::Tabs(moved))
            }

            Message::RemoveTabsInternally { window_id, tabs } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                // A removal can outrun the creation event of the tab it
                // names; removing before the tab exists would be lost.
                self.wait_for_tabs(&tabs).await;
                for tab in tabs {
                    tree::detach_tab(&self.registry, tab);
                    for child in self
                        .registry
                        .get(tab)
                        .map(|record| record.children)
                        .unwrap_or_default()
                    {
                        tree::detach_tab(&self.registry, child);
                    }
                    self.registry.remove(tab);
                }
                ticket.complete();
                self.reserve_layout(reasons::TAB_CLOSE);
                None
            }

            Message::AttachTabTo {
                window_id,
                child,
                parent,
                insert_before,
                insert_after,
            } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                // Sibling anchors are referenced tabs too, but only the
                // child and parent are mandatory; a missing anchor after the
                // wait means "append".
                let mut referenced = vec![child, parent];
                referenced.extend(insert_before);
                referenced.extend(insert_after);
                self.wait_for_tabs(&referenced).await;
                if !self.registry.contains(child) || !self.registry.contains(parent) {
                    log::debug!("attach {child}->{parent} references missing tabs, dropping");
                    return None;
                }
                tree::attach_tab_to(&self.registry, child, parent, insert_before, insert_after);
                ticket.complete();
                self.reserve_layout(reasons::TAB_MOVE);
                None
            }

            Message::DetachTab { window_id, tab } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                let ticket = self.pending.register();
                self.pending.wait_prior(&ticket).await;
                if !self.wait_for_tabs(&[tab]).await {
                    return None;
                }
                tree::detach_tab(&self.registry, tab);
                ticket.complete();
                self.reserve_layout(reasons::TAB_MOVE);
                None
            }

            Message::BlockUserOperations { window_id } => {
                if self.is_mine(window_id) {
                    self.blocker.block(BlockReason::RemoteOperation);
                }
                None
            }

            Message::UnblockUserOperations { window_id } => {
                if self.is_mine(window_id) {
                    self.blocker.unblock(BlockReason::RemoteOperation);
                }
                None
            }

            Message::BroadcastTabState { tabs, add, remove } => {
                for tab in tabs {
                    self.registry.apply_states(tab, &add, &remove);
                }
                None
            }

            Message::ConfirmToCloseTabs { window_id, count } => {
                if !self.is_mine(window_id) {
                    return None;
                }
                Some(Response::Bool(self.confirm_close(count).await))
            }
        }
    }

    async fn confirm_close(&self, count: usize) -> bool {
        if count <= 1 || !self.config.get().warn_on_close_tabs {
            return true;
        }
        match self.confirmer.confirm_close(self.registry.window(), count).await {
            Ok(true) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_millis() as u64)
                    .unwrap_or(0);
                self.config
                    .update(|config| config.last_confirmed_to_close_tabs = Some(now));
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::warn!("close confirmation failed, refusing: {err}");
                false
            }
        }
    }

    fn is_mine(&self, window: WindowId) -> bool {
        let mine = self.registry.window() == window;
        if !mine {
            log::trace!("dropping message for window {window}");
        }
        mine
    }

    async fn wait_for_tabs(&self, ids: &[TabId]) -> bool {
        let timeout = Duration::from_millis(self.config.get().tab_wait_timeout_ms);
        self.registry.wait_until_tabs_created(ids, timeout).await
    }

    fn layout_delay(&self) -> Duration {
        Duration::from_millis(self.config.get().layout_update_delay_ms)
    }

    fn reserve_layout(&self, reason_bits: u32) {
        self.layout.reserve(reason_bits, self.layout_delay());
    }
}
