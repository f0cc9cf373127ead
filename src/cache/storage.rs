//! Snapshot persistence.
//!
//! [`FileCacheStore`] keeps one YAML file per window under the platform cache
//! directory; [`MemoryCacheStore`] backs tests and private windows, which must
//! never touch disk.

use super::WindowSnapshot;
use anyhow::{Context, Result};
use arbor_config::WindowId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// Knobs for [`CacheStore::get_effective_window_cache`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectiveCacheOptions {
    /// Accept snapshots captured while pinned tabs existed. The window
    /// restore path sets this and reconciles the pinned prefix itself; the
    /// initial full load leaves it off and only trusts offset-zero snapshots.
    pub ignore_pinned_tabs: bool,
}

/// Where window snapshots live between sidebar sessions.
pub trait CacheStore: Send + Sync {
    /// Load the snapshot for a window, or `None` when there is no usable one.
    ///
    /// "Usable" means present, structurally intact (fingerprint matches) and
    /// compatible with `options`. A corrupt entry is reported as absent, not
    /// as an error: the caller's fallback is a full rebuild either way.
    fn get_effective_window_cache(
        &self,
        window: WindowId,
        options: EffectiveCacheOptions,
    ) -> impl std::future::Future<Output = Option<WindowSnapshot>> + Send;

    /// Persist the snapshot for its window, replacing any previous one.
    fn put_window_cache(
        &self,
        snapshot: &WindowSnapshot,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Drop the stored snapshot for a window, if any.
    fn clear_window_cache(
        &self,
        window: WindowId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

fn effective(snapshot: WindowSnapshot, options: EffectiveCacheOptions) -> Option<WindowSnapshot> {
    if !snapshot.integrity_ok() {
        log::warn!(
            "discarding cache for window {}: fingerprint mismatch",
            snapshot.window_id
        );
        return None;
    }
    if snapshot.offset > 0 && !options.ignore_pinned_tabs {
        log::debug!(
            "cache for window {} captured with {} pinned tabs, not usable here",
            snapshot.window_id,
            snapshot.offset
        );
        return None;
    }
    Some(snapshot)
}

/// YAML-on-disk snapshot store, one file per window.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Store rooted at the platform cache directory.
    pub fn new() -> Result<Self> {
        let dir = dirs::cache_dir()
            .context("could not determine cache directory")?
            .join("arbor-sidebar")
            .join("windows");
        Ok(Self { dir })
    }

    /// Store rooted at an explicit directory. Used by tests.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, window: WindowId) -> PathBuf {
        self.dir.join(format!("window-{}.yaml", window.0))
    }
}

impl CacheStore for FileCacheStore {
    async fn get_effective_window_cache(
        &self,
        window: WindowId,
        options: EffectiveCacheOptions,
    ) -> Option<WindowSnapshot> {
        let path = self.path_for(window);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("failed to read cache {}: {err}", path.display());
                return None;
            }
        };
        let snapshot: WindowSnapshot = match serde_yaml_ng::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("failed to parse cache {}: {err}", path.display());
                return None;
            }
        };
        if snapshot.window_id != window {
            log::warn!(
                "cache {} belongs to window {}, expected {window}",
                path.display(),
                snapshot.window_id
            );
            return None;
        }
        effective(snapshot, options)
    }

    async fn put_window_cache(&self, snapshot: &WindowSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;
        let path = self.path_for(snapshot.window_id);
        let contents =
            serde_yaml_ng::to_string(snapshot).context("failed to serialize window snapshot")?;
        // Write-then-rename so a crash never leaves a torn file behind.
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .with_context(|| format!("failed to write cache {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace cache {}", path.display()))?;
        log::debug!(
            "cached {} tabs for window {}",
            snapshot.tabs.len(),
            snapshot.window_id
        );
        Ok(())
    }

    async fn clear_window_cache(&self, window: WindowId) -> Result<()> {
        let path = self.path_for(window);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove cache {}", path.display()))
            }
        }
    }
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemoryCacheStore {
    snapshots: Mutex<HashMap<WindowId, WindowSnapshot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    async fn get_effective_window_cache(
        &self,
        window: WindowId,
        options: EffectiveCacheOptions,
    ) -> Option<WindowSnapshot> {
        let snapshot = self.snapshots.lock().get(&window).cloned()?;
        effective(snapshot, options)
    }

    async fn put_window_cache(&self, snapshot: &WindowSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .insert(snapshot.window_id, snapshot.clone());
        Ok(())
    }

    async fn clear_window_cache(&self, window: WindowId) -> Result<()> {
        self.snapshots.lock().remove(&window);
        Ok(())
    }
}
