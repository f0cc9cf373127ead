//! Configuration system and shared identifiers for the Arbor tab-tree sidebar.
//!
//! This crate is pure data: identifier newtypes shared by the sidebar and the
//! background process, the serializable [`SidebarConfig`] settings struct with
//! load/save/validation helpers, and the observable [`ConfigHandle`] through
//! which the embedding host pushes updated values at runtime.

mod config;
mod error;
mod ids;

pub use config::{ConfigHandle, ConfigKey, ObserverId, SidebarConfig};
pub use error::ConfigError;
pub use ids::{TabId, WindowId};
