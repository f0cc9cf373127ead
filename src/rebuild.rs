//! Full resynchronization of the registry against the live tab list.
//!
//! `rebuild_all` is the recovery point for every "state is suspect" moment:
//! initial load, window restore, or a cache that failed validation. It always
//! starts from the authoritative live query; the snapshot only contributes
//! tree shape when it survives validation.

use crate::cache::{restore_tabs_from_cache, WindowSnapshot};
use crate::host::TabSource;
use crate::tab::TabRegistry;
use anyhow::Result;

/// How a rebuild obtained its tree shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The snapshot validated and the tree came from it. No structure pull
    /// is needed afterwards.
    RestoredFromCache,
    /// Tabs were rebuilt flat from the live list; the caller must pull the
    /// tree shape from the background.
    RebuiltFromScratch,
}

impl RebuildOutcome {
    /// Whether the caller still needs to pull tree structure.
    pub fn needs_structure_pull(self) -> bool {
        matches!(self, Self::RebuiltFromScratch)
    }
}

/// Discard the registry contents and rebuild from the live tab list,
/// grafting tree shape from `cache` when it validates.
///
/// `offset` counts leading live tabs the snapshot does not cover (the pinned
/// prefix on the window restore path; zero on initial load).
pub async fn rebuild_all<S: TabSource>(
    registry: &TabRegistry,
    source: &S,
    cache: Option<&WindowSnapshot>,
    offset: usize,
) -> Result<RebuildOutcome> {
    let live = source.query_window_tabs(registry.window()).await?;
    registry.clear();

    if let Some(snapshot) = cache {
        if restore_tabs_from_cache(registry, snapshot, &live, offset) {
            return Ok(RebuildOutcome::RestoredFromCache);
        }
        // Validation may have partially hydrated nothing, but clear anyway so
        // the fallback starts from a known-empty registry.
        registry.clear();
    }

    for native in &live {
        registry.insert_native(native);
    }
    log::info!(
        "rebuilt {} tabs of window {} from scratch",
        live.len(),
        registry.window()
    );
    Ok(RebuildOutcome::RebuiltFromScratch)
}
