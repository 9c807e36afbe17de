//! Persistence for the tracked handle list and user settings.
//!
//! [`Database`] keeps both in SQLite; [`MemoryStore`] keeps them in process.
//! Callers go through the [`Store`] trait.

use std::future::Future;

use anyhow::Result;

mod handles;
mod memory;
mod preferences;
mod schema;
mod types;

pub use handles::{add_handle, normalize_handle, remove_handle, HandleChange};
pub use memory::MemoryStore;
pub use schema::Database;
pub use types::{
    merge_settings, merge_settings_update, DatabaseError, Settings, SettingsUpdate,
    DEFAULT_PER_HANDLE_LIMIT, DEFAULT_SOURCE_BASE, DEFAULT_TOP_N,
};

/// Where handles and settings live between runs.
pub trait Store: Send + Sync {
    /// Tracked handles, newest first. Unreadable data reads as an empty list.
    fn get_handles(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn set_handles(&self, handles: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Saved settings with defaults filled in for anything missing.
    fn get_settings(&self) -> impl Future<Output = Result<Settings>> + Send;

    /// Saves every field of `settings`.
    fn set_settings(&self, settings: &Settings) -> impl Future<Output = Result<()>> + Send;

    /// Saves only the fields `update` sets; the others keep following the defaults.
    fn update_settings(
        &self,
        update: &SettingsUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Forget saved settings so the defaults apply again.
    fn reset_settings(&self) -> impl Future<Output = Result<()>> + Send;
}
