use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::feed::item::Item;
use crate::feed::parser::parse_at;
use crate::transport::{Transport, TransportError};

/// Path segment appended after the handle to reach its RSS feed.
const FEED_PATH_SUFFIX: &str = "rss";

/// Errors that can occur while fetching one handle's feed.
///
/// An empty feed is not an error: it is `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The mirror base URL could not be turned into a feed URL
    #[error("Invalid source base URL '{url}': {reason}")]
    InvalidSourceBase { url: String, reason: String },
    /// The transport failed to retrieve the feed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

fn invalid_base(source_base: &str, reason: impl Into<String>) -> FetchError {
    FetchError::InvalidSourceBase {
        url: source_base.to_string(),
        reason: reason.into(),
    }
}

/// Parses a mirror base URL, trailing slashes stripped.
///
/// # Errors
///
/// [`FetchError::InvalidSourceBase`] if the base does not parse as an
/// absolute `http`/`https` URL that can carry path segments.
pub fn validate_source_base(source_base: &str) -> Result<Url, FetchError> {
    let url = Url::parse(source_base.trim().trim_end_matches('/'))
        .map_err(|e| invalid_base(source_base, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(invalid_base(
                source_base,
                format!("unsupported scheme '{}'", scheme),
            ))
        }
    }
    if url.cannot_be_a_base() {
        return Err(invalid_base(source_base, "URL cannot be a base"));
    }

    Ok(url)
}

/// Builds `{source_base}/{handle}/rss`, with trailing slashes on the base
/// stripped and the handle percent-encoded as a single path segment.
///
/// # Errors
///
/// [`FetchError::InvalidSourceBase`] as for [`validate_source_base`].
pub fn feed_url(source_base: &str, handle: &str) -> Result<Url, FetchError> {
    let mut url = validate_source_base(source_base)?;

    url.path_segments_mut()
        .map_err(|_| invalid_base(source_base, "URL cannot be a base"))?
        .pop_if_empty()
        .push(handle)
        .push(FEED_PATH_SUFFIX);

    Ok(url)
}

/// Fetches and parses one handle's feed.
///
/// Keeps the first `per_handle_limit` entries in feed order (not the best
/// scoring ones) and stamps `handle` on each. Relative links, as produced by
/// the HTML timeline fallback, are resolved against the feed URL.
///
/// # Errors
///
/// - [`FetchError::InvalidSourceBase`] - `source_base` is unusable
/// - [`FetchError::Transport`] - the feed could not be retrieved
pub async fn fetch_for_handle<T: Transport>(
    transport: &T,
    handle: &str,
    per_handle_limit: usize,
    source_base: &str,
) -> Result<Vec<Item>, FetchError> {
    fetch_for_handle_at(transport, handle, per_handle_limit, source_base, Utc::now()).await
}

/// [`fetch_for_handle`] with an explicit clock for undated entries.
pub async fn fetch_for_handle_at<T: Transport>(
    transport: &T,
    handle: &str,
    per_handle_limit: usize,
    source_base: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Item>, FetchError> {
    let url = feed_url(source_base, handle)?;

    let body = transport.fetch_text(url.as_str()).await?;

    let mut items = parse_at(&body, now);
    let parsed = items.len();
    items.truncate(per_handle_limit);

    for item in &mut items {
        item.handle = handle.to_string();
        if !item.link.is_empty() && Url::parse(&item.link).is_err() {
            if let Ok(resolved) = url.join(&item.link) {
                item.link = resolved.to_string();
            }
        }
    }

    tracing::debug!(
        handle = %handle,
        url = %url,
        parsed = parsed,
        kept = items.len(),
        "Fetched handle feed"
    );

    Ok(items)
}
