//! Sidebar configuration: the serializable settings struct, load/save helpers
//! and the shared observable handle.
//!
//! The sidebar itself never watches the filesystem; updated values are pushed
//! in by the embedding host (the extension's storage layer) through
//! [`ConfigHandle::update`], which notifies registered observers about the
//! keys that actually changed.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Settings that influence the synchronization core.
///
/// Presentation-only settings (styles, colors, indent sizing) live with the
/// presentation layer; only the keys the sync core reads are modeled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarConfig {
    /// Hydrate the tab registry from the cached snapshot when one is valid.
    pub use_cached_tree: bool,
    /// Ask for confirmation before closing multiple tabs at once.
    pub warn_on_close_tabs: bool,
    /// Epoch milliseconds of the last confirmed multi-tab close, if any.
    pub last_confirmed_to_close_tabs: Option<u64>,
    /// Duration of the collapse/expand animation, used as the coalescing delay
    /// for layout updates triggered by tree changes.
    pub collapse_duration_ms: u64,
    /// Upper bound on how long a message handler waits for a referenced tab to
    /// be created before treating it as gone.
    pub tab_wait_timeout_ms: u64,
    /// Minimum debounce delay for layout update reservations.
    pub layout_update_delay_ms: u64,
    /// Re-arm delay for layout updates deferred by an in-progress session
    /// restore.
    pub restore_retry_delay_ms: u64,
    /// Visual style name, forwarded to the presentation layer untouched.
    pub style: String,
    /// Whether collapse/expand animations are enabled.
    pub animation: bool,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            use_cached_tree: true,
            warn_on_close_tabs: true,
            last_confirmed_to_close_tabs: None,
            collapse_duration_ms: 150,
            tab_wait_timeout_ms: 2000,
            layout_update_delay_ms: 10,
            restore_retry_delay_ms: 100,
            style: "sidebar".to_string(),
            animation: true,
        }
    }
}

impl SidebarConfig {
    /// Validate field values, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tab_wait_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "tab_wait_timeout_ms must be positive".to_string(),
            ));
        }
        if self.restore_retry_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "restore_retry_delay_ms must be positive".to_string(),
            ));
        }
        if self.style.is_empty() {
            return Err(ConfigError::Validation(
                "style must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Default config file path: `<config dir>/arbor/sidebar.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arbor")
            .join("sidebar.yaml")
    }

    /// Load configuration from a specific file.
    ///
    /// A missing or empty file yields the defaults; a corrupt file is an
    /// error so the caller can surface it instead of silently resetting.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No sidebar config at {path:?}, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read sidebar config from {path:?}"))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SidebarConfig = serde_yaml_ng::from_str(&contents)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to parse sidebar config from {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
        let contents =
            serde_yaml_ng::to_string(self).context("Failed to serialize sidebar config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write sidebar config to {path:?}"))?;
        log::info!("Saved sidebar config to {path:?}");
        Ok(())
    }
}

/// Keys an observer can be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    UseCachedTree,
    WarnOnCloseTabs,
    LastConfirmedToCloseTabs,
    CollapseDuration,
    TabWaitTimeout,
    LayoutUpdateDelay,
    RestoreRetryDelay,
    Style,
    Animation,
}

/// Identifier of a registered config observer, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

type ObserverFn = Box<dyn Fn(ConfigKey) + Send + Sync>;

struct HandleInner {
    config: RwLock<SidebarConfig>,
    observers: Mutex<Vec<(u64, ObserverFn)>>,
    next_observer: AtomicU64,
}

/// Shared, observable handle to the live configuration.
///
/// Cloning is cheap; all clones see the same values and observer set.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<HandleInner>,
}

impl ConfigHandle {
    /// Wrap an initial configuration.
    pub fn new(config: SidebarConfig) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                config: RwLock::new(config),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    /// Snapshot the current configuration.
    pub fn get(&self) -> SidebarConfig {
        self.inner.config.read().clone()
    }

    /// Apply a mutation and notify observers for every key whose value
    /// actually changed.
    pub fn update(&self, mutate: impl FnOnce(&mut SidebarConfig)) {
        let changed = {
            let mut config = self.inner.config.write();
            let before = config.clone();
            mutate(&mut config);
            changed_keys(&before, &config)
        };
        for key in changed {
            self.notify(key);
        }
    }

    /// Register an observer called with each changed key.
    pub fn observe(&self, observer: impl Fn(ConfigKey) + Send + Sync + 'static) -> ObserverId {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner
            .observers
            .lock()
            .push((id, Box::new(observer)));
        ObserverId(id)
    }

    /// Remove a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) {
        self.inner.observers.lock().retain(|(oid, _)| *oid != id.0);
    }

    fn notify(&self, key: ConfigKey) {
        // Observers run without the config lock held so they can read back.
        let observers = self.inner.observers.lock();
        for (_, observer) in observers.iter() {
            observer(key);
        }
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(SidebarConfig::default())
    }
}

fn changed_keys(before: &SidebarConfig, after: &SidebarConfig) -> Vec<ConfigKey> {
    let mut keys = Vec::new();
    if before.use_cached_tree != after.use_cached_tree {
        keys.push(ConfigKey::UseCachedTree);
    }
    if before.warn_on_close_tabs != after.warn_on_close_tabs {
        keys.push(ConfigKey::WarnOnCloseTabs);
    }
    if before.last_confirmed_to_close_tabs != after.last_confirmed_to_close_tabs {
        keys.push(ConfigKey::LastConfirmedToCloseTabs);
    }
    if before.collapse_duration_ms != after.collapse_duration_ms {
        keys.push(ConfigKey::CollapseDuration);
    }
    if before.tab_wait_timeout_ms != after.tab_wait_timeout_ms {
        keys.push(ConfigKey::TabWaitTimeout);
    }
    if before.layout_update_delay_ms != after.layout_update_delay_ms {
        keys.push(ConfigKey::LayoutUpdateDelay);
    }
    if before.restore_retry_delay_ms != after.restore_retry_delay_ms {
        keys.push(ConfigKey::RestoreRetryDelay);
    }
    if before.style != after.style {
        keys.push(ConfigKey::Style);
    }
    if before.animation != after.animation {
        keys.push(ConfigKey::Animation);
    }
    keys
}
