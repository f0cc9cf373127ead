//! Tree snapshots: capture, validation and restore.
//!
//! A snapshot is the sidebar's serialized last-known tab tree for one window.
//! It is a hint, never an authority: the live tab list decides existence and
//! order, and a snapshot that cannot be reconciled with it positionally is
//! rejected so the caller falls back to a full rebuild.

mod storage;

pub use storage::{CacheStore, EffectiveCacheOptions, FileCacheStore, MemoryCacheStore};

use crate::tab::{NativeTab, TabRecord, TabRegistry};
use arbor_config::{TabId, WindowId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serialized form of one (non-pinned) tab within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    /// Id the tab had at capture time. Restored tabs get fresh ids, so this
    /// is only used to remap parent links, never to address live tabs.
    pub id: TabId,
    pub url: String,
    pub parent: Option<TabId>,
    pub collapsed: bool,
    pub subtree_collapsed: bool,
    pub cookie_store_id: String,
    pub fav_icon_url: Option<String>,
}

/// A serialized tab tree for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window_id: WindowId,
    /// Number of pinned tabs excluded from `tabs` at capture time.
    pub offset: usize,
    /// Integrity fingerprint over the snapshot contents; a mismatch marks a
    /// torn or tampered cache entry.
    pub fingerprint: String,
    /// Non-pinned tabs in window order.
    pub tabs: Vec<TabSnapshot>,
    /// Opaque indent-state blob, round-tripped for the presentation layer.
    /// Only meaningful when the snapshot restores from offset zero.
    pub indent: Option<String>,
}

impl WindowSnapshot {
    /// Whether the stored fingerprint matches the snapshot contents.
    pub fn integrity_ok(&self) -> bool {
        self.fingerprint == fingerprint(self.window_id, self.offset, &self.tabs)
    }
}

/// Capture a snapshot of the registry's current state.
pub fn capture_window_snapshot(registry: &TabRegistry, indent: Option<String>) -> WindowSnapshot {
    let all = registry.all_tabs();
    let offset = all.iter().filter(|record| record.pinned).count();
    let tabs: Vec<TabSnapshot> = all
        .iter()
        .filter(|record| !record.pinned)
        .map(|record| TabSnapshot {
            id: record.id,
            url: record.url.clone(),
            parent: record.parent,
            collapsed: record.collapsed,
            subtree_collapsed: record.subtree_collapsed,
            cookie_store_id: record.cookie_store_id.clone(),
            fav_icon_url: record.fav_icon_url.clone(),
        })
        .collect();
    let fingerprint = fingerprint(registry.window(), offset, &tabs);
    WindowSnapshot {
        window_id: registry.window(),
        offset,
        fingerprint,
        tabs,
        indent,
    }
}

pub(crate) fn fingerprint(window: WindowId, offset: usize, tabs: &[TabSnapshot]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(window.0.to_le_bytes());
    hasher.update(offset.to_le_bytes());
    for tab in tabs {
        hasher.update(tab.url.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Hydrate the registry from a snapshot, validated against the live list.
///
/// `offset` counts leading live tabs (the pinned prefix) that are rebuilt
/// fresh instead of from the snapshot. Returns false, leaving the registry
/// untouched, when the snapshot is not positionally reconcilable: the tab
/// count after the offset and the URL at every position must match. Live ids
/// are authoritative; cached ids only serve to remap parent links.
pub fn restore_tabs_from_cache(
    registry: &TabRegistry,
    snapshot: &WindowSnapshot,
    live_tabs: &[NativeTab],
    offset: usize,
) -> bool {
    if live_tabs.len() != offset + snapshot.tabs.len() {
        log::info!(
            "cache rejected: {} live tabs vs {} cached (+{offset} offset)",
            live_tabs.len(),
            snapshot.tabs.len()
        );
        return false;
    }
    let suffix = &live_tabs[offset..];
    for (live, cached) in suffix.iter().zip(&snapshot.tabs) {
        if live.url != cached.url {
            log::info!(
                "cache rejected: url mismatch at tab {} ({} vs {})",
                live.id,
                live.url,
                cached.url
            );
            return false;
        }
    }

    // Cached ids -> live ids, positionally.
    let id_map: std::collections::HashMap<TabId, TabId> = snapshot
        .tabs
        .iter()
        .zip(suffix)
        .map(|(cached, live)| (cached.id, live.id))
        .collect();

    for native in &live_tabs[..offset] {
        registry.insert_native(native);
    }
    for (cached, live) in snapshot.tabs.iter().zip(suffix) {
        let mut record = TabRecord::from_native(live);
        record.parent = cached.parent.and_then(|parent| id_map.get(&parent).copied());
        record.collapsed = cached.collapsed;
        record.subtree_collapsed = cached.subtree_collapsed;
        registry.insert(record);
    }
    // Rebuild child lists from the grafted parent links.
    for id in registry.ids() {
        if let Some(parent) = registry.get(id).and_then(|record| record.parent) {
            registry.update(parent, |record| record.children.push(id));
        }
    }

    log::info!(
        "restored {} tabs from cache (offset {offset})",
        snapshot.tabs.len()
    );
    true
}
