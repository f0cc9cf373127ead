//! Shared identifier newtypes.
//!
//! Tab and window identifiers are assigned by the browser and are stable for
//! the lifetime of the tab/window. Both the sidebar and the background process
//! speak in these ids; the sidebar never invents its own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a browser tab, stable for the tab's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(raw: i64) -> Self {
        TabId(raw)
    }
}

/// Unique identifier of a browser window.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WindowId {
    fn from(raw: i64) -> Self {
        WindowId(raw)
    }
}
