//! Window-scoped tab registry.
//!
//! The registry is the sidebar's mirror of the background process's model:
//! the background owns the truth, the registry is rebuilt or patched to match
//! it. Handles are cheap clones sharing one state; mutation happens in short
//! synchronous sections, never across an await.

use super::{NativeTab, TabRecord};
use crate::events::EventEmitter;
use arbor_config::{TabId, WindowId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Typed events fired by registry mutations.
///
/// Listeners run after the registry lock is released, so they may read the
/// registry freely.
#[derive(Clone, Default)]
pub struct RegistryEvents {
    pub on_created: EventEmitter<TabId>,
    pub on_removed: EventEmitter<TabId>,
    pub on_moved: EventEmitter<TabId>,
    pub on_favicon_updated: EventEmitter<TabId>,
    pub on_states_changed: EventEmitter<TabId>,
    pub on_collapsed_changed: EventEmitter<TabId>,
}

#[derive(Default)]
struct RegistryState {
    tabs: HashMap<TabId, TabRecord>,
    /// Tab ids in window order, pinned tabs first.
    order: Vec<TabId>,
    /// Ids of tabs removed since the last full rebuild. Lets a waiter
    /// distinguish "not yet created" from "already gone".
    removed: HashSet<TabId>,
}

struct RegistryInner {
    window: WindowId,
    state: Mutex<RegistryState>,
    /// Signalled whenever the id set changes (creation or removal).
    changed: Notify,
    events: RegistryEvents,
}

/// The in-memory mapping from tab identifier to tab record for one window.
#[derive(Clone)]
pub struct TabRegistry {
    inner: Arc<RegistryInner>,
}

impl TabRegistry {
    /// Create an empty registry for a window.
    pub fn new(window: WindowId) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                window,
                state: Mutex::new(RegistryState::default()),
                changed: Notify::new(),
                events: RegistryEvents::default(),
            }),
        }
    }

    /// The window this registry mirrors.
    pub fn window(&self) -> WindowId {
        self.inner.window
    }

    /// Event emitters for registry mutations.
    pub fn events(&self) -> &RegistryEvents {
        &self.inner.events
    }

    /// Insert a record at the end of the window order.
    pub fn insert(&self, record: TabRecord) {
        let id = record.id;
        {
            let mut state = self.inner.state.lock();
            state.removed.remove(&id);
            if state.tabs.insert(id, record).is_none() {
                state.order.push(id);
            }
        }
        self.inner.changed.notify_waiters();
        self.inner.events.on_created.dispatch(&id);
    }

    /// Insert a record built from a live descriptor.
    pub fn insert_native(&self, native: &NativeTab) {
        self.insert(TabRecord::from_native(native));
    }

    /// Drop every record and tombstone. Used by the rebuild engine before
    /// hydrating from cache or live state.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.tabs.clear();
        state.order.clear();
        state.removed.clear();
    }

    /// Remove a tab, tombstoning its id so pending waiters give up.
    ///
    /// The caller is responsible for detaching the tab from the tree first.
    pub fn remove(&self, id: TabId) -> Option<TabRecord> {
        let record = {
            let mut state = self.inner.state.lock();
            let record = state.tabs.remove(&id)?;
            state.order.retain(|tid| *tid != id);
            state.removed.insert(id);
            Some(record)
        };
        self.inner.changed.notify_waiters();
        self.inner.events.on_removed.dispatch(&id);
        record
    }

    /// Clone of the record for a tab, if it exists.
    pub fn get(&self, id: TabId) -> Option<TabRecord> {
        self.inner.state.lock().tabs.get(&id).cloned()
    }

    /// Whether the tab currently exists.
    pub fn contains(&self, id: TabId) -> bool {
        self.inner.state.lock().tabs.contains_key(&id)
    }

    /// Whether the tab was removed since the last rebuild.
    pub fn is_removed(&self, id: TabId) -> bool {
        self.inner.state.lock().removed.contains(&id)
    }

    /// Number of tabs.
    pub fn len(&self) -> usize {
        self.inner.state.lock().order.len()
    }

    /// Whether the registry holds no tabs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tab ids in window order.
    pub fn ids(&self) -> Vec<TabId> {
        self.inner.state.lock().order.clone()
    }

    /// All records in window order.
    pub fn all_tabs(&self) -> Vec<TabRecord> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.tabs.get(id).cloned())
            .collect()
    }

    /// Apply a mutation to one record. Returns false when the tab is gone.
    ///
    /// Prefer the dedicated mutators below when an event should fire.
    pub fn update(&self, id: TabId, mutate: impl FnOnce(&mut TabRecord)) -> bool {
        let mut state = self.inner.state.lock();
        match state.tabs.get_mut(&id) {
            Some(record) => {
                mutate(record);
                true
            }
            None => false,
        }
    }

    /// Set a tab's favicon and fire `on_favicon_updated`.
    pub fn set_favicon(&self, id: TabId, fav_icon_url: Option<String>) -> bool {
        let updated = self.update(id, |record| record.fav_icon_url = fav_icon_url);
        if updated {
            self.inner.events.on_favicon_updated.dispatch(&id);
        }
        updated
    }

    /// Add and remove broadcast state classes; fires `on_states_changed`
    /// only when the set actually changed.
    pub fn apply_states(&self, id: TabId, add: &[String], remove: &[String]) -> bool {
        let mut changed = false;
        let found = self.update(id, |record| {
            for state in add {
                changed |= record.states.insert(state.clone());
            }
            for state in remove {
                changed |= record.states.remove(state);
            }
        });
        if found && changed {
            self.inner.events.on_states_changed.dispatch(&id);
        }
        found
    }

    /// Position of a tab in the window order.
    pub fn index_of(&self, id: TabId) -> Option<usize> {
        self.inner
            .state
            .lock()
            .order
            .iter()
            .position(|tid| *tid == id)
    }

    /// Move `tabs` so they sit immediately before `anchor`, preserving the
    /// call order of `tabs`. A missing anchor moves them to the end (the
    /// background uses that for "move to bottom"). Returns the ids actually
    /// moved, in call order; the caller may be awaiting that response.
    pub fn move_tabs_before(&self, tabs: &[TabId], anchor: Option<TabId>) -> Vec<TabId> {
        self.move_tabs(tabs, anchor, false)
    }

    /// Move `tabs` so they sit immediately after `anchor`, preserving call
    /// order. A missing anchor moves them to the front.
    pub fn move_tabs_after(&self, tabs: &[TabId], anchor: Option<TabId>) -> Vec<TabId> {
        self.move_tabs(tabs, anchor, true)
    }

    fn move_tabs(&self, tabs: &[TabId], anchor: Option<TabId>, after: bool) -> Vec<TabId> {
        let moved = {
            let mut state = self.inner.state.lock();
            let moved: Vec<TabId> = tabs
                .iter()
                .copied()
                .filter(|id| state.tabs.contains_key(id))
                .collect();
            if moved.is_empty() {
                return moved;
            }
            state.order.retain(|id| !moved.contains(id));
            let insert_at = match anchor.and_then(|a| state.order.iter().position(|id| *id == a)) {
                Some(pos) if after => pos + 1,
                Some(pos) => pos,
                None if after => 0,
                None => state.order.len(),
            };
            for (offset, id) in moved.iter().enumerate() {
                state.order.insert(insert_at + offset, *id);
            }
            moved
        };
        for id in &moved {
            self.inner.events.on_moved.dispatch(id);
        }
        moved
    }

    /// Wait until every id in `ids` either exists or is known to be gone.
    ///
    /// Structural messages can race ahead of the tab creations they refer
    /// to, so handlers park here first. The wait is bounded: after `timeout`
    /// the handler falls through to its missing-referent no-op path. Returns
    /// true when every id resolved to a live tab.
    pub async fn wait_until_tabs_created(&self, ids: &[TabId], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            // Arm the notification before checking, to avoid a lost wakeup
            // between the check and the await.
            let notified = self.inner.changed.notified();
            let (settled, all_alive) = {
                let state = self.inner.state.lock();
                let settled = ids
                    .iter()
                    .all(|id| state.tabs.contains_key(id) || state.removed.contains(id));
                let all_alive = ids.iter().all(|id| state.tabs.contains_key(id));
                (settled, all_alive)
            };
            if settled {
                return all_alive;
            }
            let now = Instant::now();
            if now >= deadline {
                log::debug!("gave up waiting for tabs {ids:?}");
                return false;
            }
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                log::debug!("gave up waiting for tabs {ids:?}");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_tabs(count: i64) -> TabRegistry {
        let registry = TabRegistry::new(WindowId(1));
        for i in 0..count {
            registry.insert_native(&NativeTab::new(
                TabId(i),
                WindowId(1),
                i as usize,
                format!("https://example.com/{i}"),
            ));
        }
        registry
    }

    #[test]
    fn test_insert_preserves_order() {
        let registry = registry_with_tabs(3);
        assert_eq!(registry.ids(), vec![TabId(0), TabId(1), TabId(2)]);
    }

    #[test]
    fn test_remove_tombstones_id() {
        let registry = registry_with_tabs(2);
        assert!(registry.remove(TabId(1)).is_some());
        assert!(!registry.contains(TabId(1)));
        assert!(registry.is_removed(TabId(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_move_tabs_before_keeps_call_order() {
        let registry = registry_with_tabs(4);
        let moved = registry.move_tabs_before(&[TabId(3), TabId(1)], Some(TabId(0)));
        assert_eq!(moved, vec![TabId(3), TabId(1)]);
        assert_eq!(
            registry.ids(),
            vec![TabId(3), TabId(1), TabId(0), TabId(2)]
        );
    }

    #[test]
    fn test_move_tabs_after_missing_anchor_moves_to_front() {
        let registry = registry_with_tabs(3);
        registry.move_tabs_after(&[TabId(2)], None);
        assert_eq!(registry.ids(), vec![TabId(2), TabId(0), TabId(1)]);
    }

    #[test]
    fn test_move_skips_unknown_tabs() {
        let registry = registry_with_tabs(2);
        let moved = registry.move_tabs_before(&[TabId(9), TabId(0)], Some(TabId(1)));
        assert_eq!(moved, vec![TabId(0)]);
    }

    #[tokio::test]
    async fn test_wait_resolves_on_late_creation() {
        let registry = registry_with_tabs(0);
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait_until_tabs_created(&[TabId(5)], Duration::from_secs(1))
                    .await
            })
        };
        tokio::task::yield_now().await;
        registry.insert_native(&NativeTab::new(TabId(5), WindowId(1), 0, "about:blank"));
        assert!(waiter.await.unwrap(), "waiter should see the new tab");
    }

    #[tokio::test]
    async fn test_wait_times_out_for_unknown_tab() {
        let registry = registry_with_tabs(1);
        let alive = registry
            .wait_until_tabs_created(&[TabId(99)], Duration::from_millis(30))
            .await;
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_wait_resolves_immediately_for_removed_tab() {
        let registry = registry_with_tabs(1);
        registry.remove(TabId(0));
        let alive = registry
            .wait_until_tabs_created(&[TabId(0)], Duration::from_secs(5))
            .await;
        assert!(!alive, "removed tab settles the wait without timing out");
    }
}
