//! Fetch → parse → score → rank across every configured handle.
//!
//! A [`Pipeline`] owns the transport and a run-in-progress flag. Each call to
//! [`Pipeline::run`] snapshots the handle list and settings it is given,
//! fetches every handle concurrently (bounded), isolates per-handle failures,
//! then scores, sorts and truncates the merged items.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::feed::{fetch_for_handle_at, validate_source_base, FetchError, Item};
use crate::score::score;
use crate::storage::Settings;
use crate::transport::{Transport, TransportError};

/// Default budget for one handle's fetch, transport fallback included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Default number of handles fetched at the same time.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Tunables that are not part of the user-editable settings.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// A handle whose fetch takes longer than this is recorded as timed out.
    pub fetch_timeout: Duration,
    /// Upper bound on in-flight handle fetches (at least 1).
    pub max_concurrent_fetches: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// Run-level failure. Everything per-handle is reported in [`RunOutcome`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot run: {0}")]
    InvalidSettings(#[source] FetchError),
}

/// A handle that contributed nothing because its fetch failed.
#[derive(Debug)]
pub struct HandleFailure {
    pub handle: String,
    pub error: FetchError,
}

/// Why a run produced no items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The handle list was empty.
    NoHandles,
    /// Handles were configured but no items survived (failures or empty feeds).
    NoItems,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub enum RunOutcome {
    /// At least one item, sorted by score then recency, at most `top_n` long.
    Ranked {
        items: Vec<Item>,
        failures: Vec<HandleFailure>,
    },
    /// Nothing to show; not an error.
    Empty {
        reason: EmptyReason,
        failures: Vec<HandleFailure>,
    },
    /// Another run was already in progress; this call did nothing.
    Busy,
}

impl RunOutcome {
    /// Ranked items, or an empty slice for the other outcomes.
    pub fn items(&self) -> &[Item] {
        match self {
            RunOutcome::Ranked { items, .. } => items,
            _ => &[],
        }
    }

    /// Handles that failed during the run.
    pub fn failures(&self) -> &[HandleFailure] {
        match self {
            RunOutcome::Ranked { failures, .. } | RunOutcome::Empty { failures, .. } => failures,
            RunOutcome::Busy => &[],
        }
    }
}

/// Clears the run flag on every exit path, including early returns and panics.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Pipeline<T> {
    transport: T,
    options: PipelineOptions,
    running: AtomicBool,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, options: PipelineOptions) -> Self {
        Self {
            transport,
            options,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a run currently holds the run flag.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs the pipeline against the wall clock.
    pub async fn run(
        &self,
        handles: &[String],
        settings: &Settings,
    ) -> Result<RunOutcome, PipelineError> {
        self.run_at(handles, settings, Utc::now()).await
    }

    /// Runs the pipeline with a fixed `now` (used for undated items and recency).
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidSettings`] when the source base URL is unusable.
    /// Per-handle failures never fail the run.
    pub async fn run_at(
        &self,
        handles: &[String],
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, PipelineError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("Refresh already in progress, ignoring trigger");
            return Ok(RunOutcome::Busy);
        };

        let settings = settings.clone().clamped();

        if handles.is_empty() {
            return Ok(RunOutcome::Empty {
                reason: EmptyReason::NoHandles,
                failures: Vec::new(),
            });
        }

        validate_source_base(&settings.source_base).map_err(PipelineError::InvalidSettings)?;

        tracing::info!(
            handles = handles.len(),
            source = %settings.source_base,
            per_handle = settings.per_handle_limit,
            top_n = settings.top_n,
            "Starting refresh"
        );

        let mut results: Vec<(usize, Result<Vec<Item>, FetchError>)> =
            stream::iter(handles.iter().enumerate())
                .map(|(idx, handle)| {
                    let settings = &settings;
                    async move { (idx, self.fetch_one(handle, settings, now).await) }
                })
                .buffer_unordered(self.options.max_concurrent_fetches.max(1))
                .collect()
                .await;

        // buffer_unordered yields in completion order; merge in handle order
        results.sort_by_key(|(idx, _)| *idx);

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (idx, result) in results {
            match result {
                Ok(mut items) => merged.append(&mut items),
                Err(error) => {
                    tracing::warn!(handle = %handles[idx], error = %error, "Fetch failed for handle");
                    failures.push(HandleFailure {
                        handle: handles[idx].clone(),
                        error,
                    });
                }
            }
        }

        let items = rank(merged, settings.top_n, now);

        tracing::info!(
            ranked = items.len(),
            failed = failures.len(),
            "Refresh complete"
        );

        if items.is_empty() {
            return Ok(RunOutcome::Empty {
                reason: EmptyReason::NoItems,
                failures,
            });
        }

        Ok(RunOutcome::Ranked { items, failures })
    }

    async fn fetch_one(
        &self,
        handle: &str,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<Item>, FetchError> {
        let fetch = fetch_for_handle_at(
            &self.transport,
            handle,
            settings.per_handle_limit,
            &settings.source_base,
            now,
        );

        match tokio::time::timeout(self.options.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transport(TransportError::Timeout)),
        }
    }
}

/// Scores every item, sorts by score (then newer first) and keeps the top `top_n`.
///
/// The sort is stable, so items tied on both keys keep their merge order.
pub fn rank(mut items: Vec<Item>, top_n: usize, now: DateTime<Utc>) -> Vec<Item> {
    for item in &mut items {
        item.score = Some(score(item, now));
    }

    items.sort_by(|a, b| {
        let (sa, sb) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
        sb.total_cmp(&sa)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });

    items.truncate(top_n);
    items
}
