//! State-synchronization core for a tab-tree sidebar.
//!
//! The sidebar is a transient view over tab state owned by a long-lived
//! background process. This crate keeps the view consistent with that
//! authority: it mirrors tabs into a window-scoped registry, applies the
//! background's structural messages in causal order, hydrates from validated
//! snapshots on startup and window restore, and gates user interaction while
//! the view is mid-transition.
//!
//! [`session::SidebarSession`] wires the pieces together; the host supplies
//! the browser-facing plumbing through the traits in [`host`] and
//! [`background`].

pub mod background;
pub mod blocker;
pub mod cache;
pub mod events;
pub mod host;
pub mod layout;
pub mod messages;
pub mod pending;
pub mod rebuild;
pub mod restoring;
pub mod router;
pub mod session;
pub mod tab;
pub mod tree;

pub use arbor_config::{ConfigHandle, SidebarConfig, TabId, WindowId};

pub use background::{wait_until_background_is_ready, BackgroundPort};
pub use blocker::{BlockGuard, BlockReason, UserOperationBlocker};
pub use cache::{
    capture_window_snapshot, restore_tabs_from_cache, CacheStore, EffectiveCacheOptions,
    FileCacheStore, MemoryCacheStore, WindowSnapshot,
};
pub use host::{CloseConfirmer, TabSource};
pub use layout::{LayoutScheduler, LayoutUpdate};
pub use messages::{parse_message, Message, Response, TreeStructureEntry};
pub use pending::{ChangeTicket, PendingChanges};
pub use rebuild::{rebuild_all, RebuildOutcome};
pub use restoring::RestoringTabs;
pub use router::MessageRouter;
pub use session::SidebarSession;
pub use tab::{NativeTab, TabRecord, TabRegistry};
