//! Sidebar session lifecycle.
//!
//! A [`SidebarSession`] owns the full component graph for one window and
//! drives the startup sequence: block user operations, handshake with the
//! background, hydrate from cache or live state, announce ourselves, pull
//! tree structure when the cache could not provide it, then unblock. The same
//! graph serves window restores and steady-state message handling.

use crate::background::{wait_until_background_is_ready, BackgroundPort};
use crate::blocker::{BlockReason, UserOperationBlocker};
use crate::cache::{
    capture_window_snapshot, CacheStore, EffectiveCacheOptions, WindowSnapshot,
};
use crate::host::{CloseConfirmer, TabSource};
use crate::layout::{reasons, LayoutScheduler};
use crate::messages::{Message, Response};
use crate::pending::PendingChanges;
use crate::rebuild::{rebuild_all, RebuildOutcome};
use crate::restoring::RestoringTabs;
use crate::router::MessageRouter;
use crate::tab::TabRegistry;
use crate::tree;
use anyhow::Result;
use arbor_config::{ConfigHandle, WindowId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// The component graph of one sidebar window.
pub struct SidebarSession<P, S, C, K> {
    registry: TabRegistry,
    config: ConfigHandle,
    blocker: UserOperationBlocker,
    pending: PendingChanges,
    restoring: RestoringTabs,
    layout: LayoutScheduler,
    router: MessageRouter<C>,
    port: Arc<P>,
    tabs: Arc<S>,
    cache: Arc<K>,
    background_ready: Arc<Notify>,
}

impl<P, S, C, K> SidebarSession<P, S, C, K>
where
    P: BackgroundPort,
    S: TabSource,
    C: CloseConfirmer,
    K: CacheStore + 'static,
{
    pub fn new(
        window: WindowId,
        config: ConfigHandle,
        port: Arc<P>,
        tabs: Arc<S>,
        confirmer: Arc<C>,
        cache: Arc<K>,
    ) -> Self {
        let registry = TabRegistry::new(window);
        let blocker = UserOperationBlocker::new();
        let pending = PendingChanges::new();
        let restoring = RestoringTabs::new();
        let retry_delay = Duration::from_millis(config.get().restore_retry_delay_ms);
        let layout = LayoutScheduler::new(restoring.clone(), retry_delay);
        let background_ready = Arc::new(Notify::new());
        let router = MessageRouter::new(
            registry.clone(),
            config.clone(),
            blocker.clone(),
            pending.clone(),
            restoring.clone(),
            layout.clone(),
            confirmer,
            background_ready.clone(),
        );

        let session = Self {
            registry,
            config,
            blocker,
            pending,
            restoring,
            layout,
            router,
            port,
            tabs,
            cache,
            background_ready,
        };
        session.wire_layout_events();
        session.wire_cache_writeback();
        session
    }

    /// Registry churn feeds the layout scheduler so the presentation layer
    /// recomputes once per burst instead of once per event.
    fn wire_layout_events(&self) {
        let events = self.registry.events();
        let delay = Duration::from_millis(self.config.get().layout_update_delay_ms);

        let layout = self.layout.clone();
        events
            .on_created
            .subscribe(move |_| layout.reserve(reasons::TAB_OPEN, delay));
        let layout = self.layout.clone();
        events
            .on_removed
            .subscribe(move |_| layout.reserve(reasons::TAB_CLOSE, delay));
        let layout = self.layout.clone();
        events
            .on_moved
            .subscribe(move |_| layout.reserve(reasons::TAB_MOVE, delay));
    }

    /// Every layout flush is a quiet point after a burst of mutations, so it
    /// doubles as the write-back trigger for the snapshot cache.
    fn wire_cache_writeback(&self) {
        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let config = self.config.clone();
        self.layout.on_layout().subscribe(move |_| {
            if !config.get().use_cached_tree {
                return;
            }
            let snapshot = capture_window_snapshot(&registry, None);
            let cache = cache.clone();
            tokio::spawn(async move {
                let window = snapshot.window_id;
                if let Err(err) = cache.put_window_cache(&snapshot).await {
                    log::warn!("cache write-back for window {window} failed: {err:#}");
                }
            });
        });
    }

    /// Run the startup sequence. User operations stay blocked for the whole
    /// sequence, including every early error return.
    pub async fn init(&self) -> Result<RebuildOutcome> {
        let window = self.registry.window();
        log::info!("initializing sidebar for window {window}");
        let _guard = self.blocker.block_scoped(BlockReason::Startup);

        let retry = Duration::from_millis(self.config.get().restore_retry_delay_ms);
        wait_until_background_is_ready(&*self.port, &self.background_ready, retry).await;

        let snapshot = self.lookup_cache(EffectiveCacheOptions::default()).await;
        let outcome = rebuild_all(&self.registry, &*self.tabs, snapshot.as_ref(), 0).await?;

        self.port.notify_sidebar_opened(window).await?;
        if outcome.needs_structure_pull() {
            let structure = self.port.pull_tree_structure(window).await?;
            tree::apply_tree_structure(&self.registry, &structure);
        }

        self.persist_cache().await;
        log::info!("sidebar for window {window} initialized ({outcome:?})");
        Ok(outcome)
    }

    /// React to the browser restoring this window from a previous session.
    ///
    /// Pinned tabs reappear before the cache's portion of the tab list, so
    /// the snapshot's pinned offset shifts validation; a live list that does
    /// not even reach past the offset marks the cache as stale outright.
    pub async fn handle_window_restoring(&self) -> Result<RebuildOutcome> {
        let window = self.registry.window();
        log::info!("window {window} is being restored");
        let _guard = self.blocker.block_scoped(BlockReason::SessionRestore);

        let mut snapshot = self
            .lookup_cache(EffectiveCacheOptions {
                ignore_pinned_tabs: true,
            })
            .await;
        if let Some(ref candidate) = snapshot {
            let live = self.tabs.query_window_tabs(window).await?;
            if live.len() <= candidate.offset {
                log::info!(
                    "cache for window {window} only covers the pinned prefix, discarding"
                );
                snapshot = None;
            }
        }

        let offset = snapshot.as_ref().map(|s| s.offset).unwrap_or(0);
        let outcome = rebuild_all(&self.registry, &*self.tabs, snapshot.as_ref(), offset).await?;
        if outcome.needs_structure_pull() {
            let structure = self.port.pull_tree_structure(window).await?;
            tree::apply_tree_structure(&self.registry, &structure);
        }

        self.persist_cache().await;
        Ok(outcome)
    }

    async fn lookup_cache(&self, options: EffectiveCacheOptions) -> Option<WindowSnapshot> {
        if !self.config.get().use_cached_tree {
            return None;
        }
        self.cache
            .get_effective_window_cache(self.registry.window(), options)
            .await
    }

    /// Snapshot the current tree and persist it. Failures are logged, not
    /// propagated: a missing cache only costs the next startup a rebuild.
    pub async fn persist_cache(&self) {
        if !self.config.get().use_cached_tree {
            return;
        }
        let snapshot = capture_window_snapshot(&self.registry, None);
        if let Err(err) = self.cache.put_window_cache(&snapshot).await {
            log::warn!(
                "failed to cache window {}: {err:#}",
                self.registry.window()
            );
        }
    }

    /// Feed one raw message through the router.
    pub async fn handle_raw_message(&self, value: &serde_json::Value) -> Option<Response> {
        self.router.handle_raw(value).await
    }

    /// Feed one parsed message through the router.
    pub async fn handle_message(&self, message: Message) -> Option<Response> {
        self.router.handle(message).await
    }

    /// Ask for close confirmation on behalf of a local close gesture.
    pub async fn confirm_to_close_tabs(&self, count: usize) -> bool {
        match self
            .router
            .handle(Message::ConfirmToCloseTabs {
                window_id: self.registry.window(),
                count,
            })
            .await
        {
            Some(Response::Bool(answer)) => answer,
            _ => true,
        }
    }

    /// The sidebar gained focus.
    pub async fn focus(&self) {
        if let Err(err) = self.port.notify_sidebar_focused(self.registry.window()).await {
            log::debug!("focus notification failed: {err}");
        }
    }

    /// The sidebar lost focus.
    pub async fn blur(&self) {
        if let Err(err) = self.port.notify_sidebar_blurred(self.registry.window()).await {
            log::debug!("blur notification failed: {err}");
        }
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn blocker(&self) -> &UserOperationBlocker {
        &self.blocker
    }

    pub fn restoring(&self) -> &RestoringTabs {
        &self.restoring
    }

    pub fn layout(&self) -> &LayoutScheduler {
        &self.layout
    }

    pub fn pending_changes(&self) -> &PendingChanges {
        &self.pending
    }
}
