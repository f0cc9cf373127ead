//! Channel to the background process.
//!
//! The background owns the tree; the sidebar is a client that must not start
//! consuming messages before the background can answer for itself. The
//! readiness handshake pings until acknowledged, with an escape hatch: if the
//! background pings us first (it restarted and found our window), that counts
//! as ready too.

use crate::messages::TreeStructureEntry;
use anyhow::Result;
use arbor_config::WindowId;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Notify;

/// Outbound channel to the background process.
pub trait BackgroundPort: Send + Sync {
    /// Probe whether the background is up. `Ok(false)` and `Err` both mean
    /// "not yet"; the handshake keeps retrying.
    fn ping(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Ask the background for the authoritative tree shape of a window.
    fn pull_tree_structure(
        &self,
        window: WindowId,
    ) -> impl Future<Output = Result<Vec<TreeStructureEntry>>> + Send;

    /// Announce that the sidebar for `window` is open and consuming messages.
    fn notify_sidebar_opened(&self, window: WindowId) -> impl Future<Output = Result<()>> + Send;

    /// Announce that the sidebar gained focus.
    fn notify_sidebar_focused(&self, window: WindowId) -> impl Future<Output = Result<()>> + Send;

    /// Announce that the sidebar lost focus.
    fn notify_sidebar_blurred(&self, window: WindowId) -> impl Future<Output = Result<()>> + Send;
}

/// Block until the background process answers a ping, or until
/// `unsolicited_ready` fires because the background probed us first.
///
/// Retries forever; startup cannot proceed without a background.
pub async fn wait_until_background_is_ready<P: BackgroundPort>(
    port: &P,
    unsolicited_ready: &Notify,
    retry_interval: Duration,
) {
    let mut attempts = 0u32;
    loop {
        // Arm before pinging so a ping from the background is never lost
        // between our probe failing and the next await.
        let notified = unsolicited_ready.notified();
        match port.ping().await {
            Ok(true) => {
                log::info!("background process ready after {attempts} retries");
                return;
            }
            Ok(false) => {}
            Err(err) => log::debug!("background ping failed: {err}"),
        }
        attempts += 1;
        tokio::select! {
            _ = notified => {
                log::info!("background process announced itself, skipping handshake");
                return;
            }
            _ = tokio::time::sleep(retry_interval) => {}
        }
    }
}
