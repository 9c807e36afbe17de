//! Ranks recent posts from a list of handles, read through a Nitter-style mirror.
//!
//! Each run fetches `{source_base}/{handle}/rss` for every tracked handle,
//! keeps the first few entries per handle, scores them with a fixed
//! engagement heuristic and returns the overall top N.
//!
//! - [`transport`] - HTTP retrieval with an optional proxy fallback
//! - [`feed`] - per-handle feed URL building, fetching and parsing
//! - [`score`] - the ranking heuristic
//! - [`pipeline`] - concurrent fetch, merge and rank with a run guard
//! - [`storage`] - persisted handle list and settings
//! - [`render`] - terminal and JSON output

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod render;
pub mod score;
pub mod storage;
pub mod transport;
pub mod util;
