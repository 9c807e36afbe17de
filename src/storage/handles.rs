use anyhow::Result;

use super::Store;

/// Result of editing the handle list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleChange {
    /// The normalized handle was added (or removed).
    Applied(String),
    /// Nothing changed: already tracked on add, not tracked on remove.
    Unchanged(String),
    /// Input was empty after normalization.
    Invalid,
}

/// Trims whitespace, drops leading `@`s and lowercases.
///
/// Returns `None` when nothing is left.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim().trim_start_matches('@').trim().to_lowercase();
    (!handle.is_empty()).then_some(handle)
}

/// Adds `raw` to the front of the tracked list unless it is already present.
pub async fn add_handle<S: Store>(store: &S, raw: &str) -> Result<HandleChange> {
    let Some(handle) = normalize_handle(raw) else {
        return Ok(HandleChange::Invalid);
    };

    let mut handles = store.get_handles().await?;
    if handles.contains(&handle) {
        return Ok(HandleChange::Unchanged(handle));
    }

    handles.insert(0, handle.clone());
    store.set_handles(&handles).await?;
    tracing::info!(handle = %handle, total = handles.len(), "Added handle");

    Ok(HandleChange::Applied(handle))
}

/// Removes `raw` (normalized) from the tracked list.
pub async fn remove_handle<S: Store>(store: &S, raw: &str) -> Result<HandleChange> {
    let Some(handle) = normalize_handle(raw) else {
        return Ok(HandleChange::Invalid);
    };

    let mut handles = store.get_handles().await?;
    let before = handles.len();
    handles.retain(|h| h != &handle);
    if handles.len() == before {
        return Ok(HandleChange::Unchanged(handle));
    }

    store.set_handles(&handles).await?;
    tracing::info!(handle = %handle, total = handles.len(), "Removed handle");

    Ok(HandleChange::Applied(handle))
}
