//! Seams to the hosting browser environment.
//!
//! The sync core never talks to the browser directly; it goes through these
//! traits so tests (and alternative hosts) can substitute their own plumbing.

use crate::tab::NativeTab;
use anyhow::Result;
use arbor_config::WindowId;
use std::future::Future;

/// Source of the authoritative live tab list.
pub trait TabSource: Send + Sync {
    /// Query the current tabs of a window, in window order.
    fn query_window_tabs(
        &self,
        window: WindowId,
    ) -> impl Future<Output = Result<Vec<NativeTab>>> + Send;
}

/// Asks the user whether closing a batch of tabs is really intended.
pub trait CloseConfirmer: Send + Sync {
    /// Present the confirmation for closing `count` tabs. Returns the user's
    /// answer; an error counts as a refusal upstream.
    fn confirm_close(
        &self,
        window: WindowId,
        count: usize,
    ) -> impl Future<Output = Result<bool>> + Send;
}
