//! Wire protocol between the background process and the sidebar.
//!
//! Messages are JSON objects tagged by a kebab-case `type` field, matching
//! the extension's message taxonomy. Unknown types must be tolerated: other
//! extensions share the same runtime channel, so [`parse_message`] returns
//! `None` instead of an error for anything unrecognized.

use arbor_config::{TabId, WindowId};
use serde::{Deserialize, Serialize};

/// One entry of a serialized tree shape: the tab at this position points at
/// the position of its parent within the same list.
///
/// The legacy wire format encodes roots as `parent: -1`; the serde shim below
/// keeps that representation on the wire while the in-memory form is an
/// `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStructureEntry {
    #[serde(
        serialize_with = "serialize_parent",
        deserialize_with = "deserialize_parent"
    )]
    pub parent: Option<usize>,
    #[serde(default)]
    pub collapsed: bool,
}

fn serialize_parent<S: serde::Serializer>(
    parent: &Option<usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match parent {
        Some(index) => serializer.serialize_i64(*index as i64),
        None => serializer.serialize_i64(-1),
    }
}

fn deserialize_parent<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<usize>, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    if raw < 0 {
        Ok(None)
    } else {
        Ok(Some(raw as usize))
    }
}

/// Inbound messages the sidebar consumes.
///
/// Window-scoped unless the router documents otherwise (restoring counters
/// and the broadcast applies are global).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// Readiness probe; answered with a boolean ack when the window matches.
    PingToSidebar { window_id: WindowId },
    /// Authoritative structure push for a whole window.
    PushTreeStructure {
        window_id: WindowId,
        structure: Vec<TreeStructureEntry>,
    },
    /// A tab restoration started (global).
    NotifyTabRestoring,
    /// A tab restoration finished (global).
    NotifyTabRestored,
    /// Favicon changed for one tab.
    NotifyTabFaviconUpdated {
        tab: TabId,
        fav_icon_url: Option<String>,
    },
    /// Collapse or expand a whole subtree.
    ChangeSubtreeCollapsedState {
        window_id: WindowId,
        tab: TabId,
        collapsed: bool,
        #[serde(default)]
        just_now: bool,
        #[serde(default)]
        manual_operation: bool,
    },
    /// Collapse or expand a single tab. `by_ancestor` marks broadcasts
    /// derived from an ancestor's state; those are dropped when stale.
    ChangeTabCollapsedState {
        window_id: WindowId,
        tab: TabId,
        collapsed: bool,
        #[serde(default)]
        just_now: bool,
        #[serde(default)]
        by_ancestor: bool,
    },
    /// Bulk reorder: place `tabs` immediately before `next_tab`.
    MoveTabsBefore {
        window_id: WindowId,
        tabs: Vec<TabId>,
        next_tab: Option<TabId>,
    },
    /// Bulk reorder: place `tabs` immediately after `previous_tab`.
    MoveTabsAfter {
        window_id: WindowId,
        tabs: Vec<TabId>,
        previous_tab: Option<TabId>,
    },
    /// Remove tabs from the registry without a browser round-trip.
    RemoveTabsInternally {
        window_id: WindowId,
        tabs: Vec<TabId>,
    },
    /// Structural edit: attach `child` under `parent`.
    AttachTabTo {
        window_id: WindowId,
        child: TabId,
        parent: TabId,
        #[serde(default)]
        insert_before: Option<TabId>,
        #[serde(default)]
        insert_after: Option<TabId>,
    },
    /// Structural edit: detach a tab from its parent.
    DetachTab { window_id: WindowId, tab: TabId },
    /// Gate control from the background process.
    BlockUserOperations { window_id: WindowId },
    /// Gate release from the background process.
    UnblockUserOperations { window_id: WindowId },
    /// Add/remove broadcast state classes on a set of tabs (global).
    BroadcastTabState {
        tabs: Vec<TabId>,
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
    },
    /// Ask the user to confirm closing `count` tabs.
    ConfirmToCloseTabs { window_id: WindowId, count: usize },
}

/// Responses the router can produce for messages that expect one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Ack for `ping-to-sidebar` and answer for `confirm-to-close-tabs`.
    Bool(bool),
    /// Resulting tab ids for the bulk move commands, in call order.
    Tabs(Vec<TabId>),
}

/// Parse a raw JSON message, ignoring unrecognized or malformed types.
pub fn parse_message(value: &serde_json::Value) -> Option<Message> {
    match serde_json::from_value(value.clone()) {
        Ok(message) => Some(message),
        Err(err) => {
            log::debug!("ignoring unrecognized message: {err}");
            None
        }
    }
}
