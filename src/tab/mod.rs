//! Tab records and live tab descriptors.
//!
//! This module provides the sidebar's tab data model:
//! - [`TabRecord`]: one tab as the sidebar mirrors it (tree links, flags,
//!   broadcast state classes)
//! - [`NativeTab`]: one tab as the browser's live query reports it
//! - [`TabRegistry`]: the window-scoped container coordinating them

mod registry;

pub use registry::{RegistryEvents, TabRegistry};

use arbor_config::{TabId, WindowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A tab as reported by the browser's live tab query.
///
/// This is the authoritative source for existence and order; the sidebar
/// never trusts cached data over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTab {
    pub id: TabId,
    pub window_id: WindowId,
    /// Position within the window, pinned tabs first.
    pub index: usize,
    pub url: String,
    pub pinned: bool,
    pub active: bool,
    pub audible: bool,
    pub muted: bool,
    pub discarded: bool,
    pub incognito: bool,
    /// Container (cookie store) this tab belongs to.
    pub cookie_store_id: String,
    pub fav_icon_url: Option<String>,
}

impl NativeTab {
    /// Minimal descriptor; the remaining fields default to an ordinary
    /// unpinned, inactive tab in the default container.
    pub fn new(id: TabId, window_id: WindowId, index: usize, url: impl Into<String>) -> Self {
        Self {
            id,
            window_id,
            index,
            url: url.into(),
            pinned: false,
            active: false,
            audible: false,
            muted: false,
            discarded: false,
            incognito: false,
            cookie_store_id: "default".to_string(),
            fav_icon_url: None,
        }
    }
}

/// One tab as mirrored by the sidebar.
///
/// Owned by the [`TabRegistry`]; mutated only through router handlers or
/// local actions that are themselves relayed back to the background process.
/// Parent/child links are weak references by id, never ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct TabRecord {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
    /// Parent tab in the tree, if any.
    pub parent: Option<TabId>,
    /// Direct children, in tree order.
    pub children: Vec<TabId>,
    /// Hidden because some ancestor's subtree is collapsed.
    pub collapsed: bool,
    /// This tab's own twisty state: children are hidden.
    pub subtree_collapsed: bool,
    pub pinned: bool,
    pub audible: bool,
    pub muted: bool,
    pub discarded: bool,
    pub incognito: bool,
    pub cookie_store_id: String,
    pub fav_icon_url: Option<String>,
    /// The browser is currently recreating this tab from session data.
    pub restoring: bool,
    /// Broadcast state classes applied by the background process.
    pub states: BTreeSet<String>,
}

impl TabRecord {
    /// Build a fresh record from a live descriptor. The tab starts as a root;
    /// tree links arrive separately from the background process.
    pub fn from_native(native: &NativeTab) -> Self {
        Self {
            id: native.id,
            window_id: native.window_id,
            url: native.url.clone(),
            parent: None,
            children: Vec::new(),
            collapsed: false,
            subtree_collapsed: false,
            pinned: native.pinned,
            audible: native.audible,
            muted: native.muted,
            discarded: native.discarded,
            incognito: native.incognito,
            cookie_store_id: native.cookie_store_id.clone(),
            fav_icon_url: native.fav_icon_url.clone(),
            restoring: false,
            states: BTreeSet::new(),
        }
    }

    /// Whether this tab is a tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
