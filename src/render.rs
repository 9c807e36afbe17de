//! Terminal and JSON presentation of a [`RunOutcome`].
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::feed::Item;
use crate::pipeline::{EmptyReason, HandleFailure, RunOutcome};
use crate::score::{explain, ScoreBreakdown};
use crate::util::{strip_control_chars, time_since, truncate_to_width};

pub const NO_HANDLES_MESSAGE: &str = "No handles yet. Add a handle to get started.";
pub const NO_ITEMS_MESSAGE: &str =
    "No tweets found for these handles — try again or change the mirror in settings.";
pub const BUSY_MESSAGE: &str = "A refresh is already in progress.";

/// Widest the link line of a card may get.
const LINK_WIDTH: usize = 72;

/// `host/path` of a link, or the input unchanged if it is not a URL.
pub fn short_link(link: &str) -> String {
    match Url::parse(link) {
        Ok(url) => format!("{}{}", url.host_str().unwrap_or_default(), url.path()),
        Err(_) => link.to_string(),
    }
}

/// Human-readable report: one card per ranked item, or the empty/busy message.
///
/// With `show_breakdown` each card also lists its per-term score contributions.
pub fn render_text(outcome: &RunOutcome, now: DateTime<Utc>, show_breakdown: bool) -> String {
    let mut out = String::new();

    match outcome {
        RunOutcome::Busy => {
            out.push_str(BUSY_MESSAGE);
            out.push('\n');
        }
        RunOutcome::Empty { reason, .. } => {
            out.push_str(empty_message(*reason));
            out.push('\n');
        }
        RunOutcome::Ranked { items, .. } => {
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push('\n');
                }
                write_card(&mut out, item, now, show_breakdown);
            }
        }
    }

    write_failures(&mut out, outcome.failures());
    out
}

fn empty_message(reason: EmptyReason) -> &'static str {
    match reason {
        EmptyReason::NoHandles => NO_HANDLES_MESSAGE,
        EmptyReason::NoItems => NO_ITEMS_MESSAGE,
    }
}

fn write_card(out: &mut String, item: &Item, now: DateTime<Utc>, show_breakdown: bool) {
    let score = item.score.unwrap_or(0.0).round() as i64;
    // SEC-001: feed text is untrusted; strip escape sequences before printing
    let handle = strip_control_chars(&item.handle);
    let text = strip_control_chars(&item.text);
    let link = short_link(&item.display_link());

    let _ = writeln!(
        out,
        "@{} • {}  Score {}",
        handle,
        time_since(item.published_at, now),
        score
    );
    if !text.is_empty() {
        let _ = writeln!(out, "{}", text);
    }
    if !link.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            truncate_to_width(&strip_control_chars(&link), LINK_WIDTH)
        );
    }
    if show_breakdown {
        let b = explain(item, now);
        let _ = writeln!(
            out,
            "  base {} + hashtags {} + mentions {} + numbers {} + keyword {} + magnitude {} + recency {:.1}",
            b.base,
            b.hashtags,
            b.mentions,
            b.numbers,
            b.engagement_keyword,
            b.engagement_magnitude,
            b.recency
        );
    }
}

fn write_failures(out: &mut String, failures: &[HandleFailure]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{} handle(s) could not be fetched:", failures.len());
    for failure in failures {
        let _ = writeln!(
            out,
            "  @{}: {}",
            strip_control_chars(&failure.handle),
            failure.error
        );
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ranked,
    Empty,
    Busy,
}

#[derive(Serialize)]
struct JsonItem<'a> {
    handle: &'a str,
    text: &'a str,
    link: String,
    published_at: DateTime<Utc>,
    age: String,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<ScoreBreakdown>,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    handle: &'a str,
    error: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    items: Vec<JsonItem<'a>>,
    failures: Vec<JsonFailure<'a>>,
}

/// Machine-readable report of the same content as [`render_text`].
pub fn render_json(
    outcome: &RunOutcome,
    now: DateTime<Utc>,
    show_breakdown: bool,
) -> serde_json::Result<String> {
    let (status, message) = match outcome {
        RunOutcome::Ranked { .. } => (Status::Ranked, None),
        RunOutcome::Empty { reason, .. } => (Status::Empty, Some(empty_message(*reason))),
        RunOutcome::Busy => (Status::Busy, Some(BUSY_MESSAGE)),
    };

    let items = outcome
        .items()
        .iter()
        .map(|item| JsonItem {
            handle: &item.handle,
            text: &item.text,
            link: item.display_link(),
            published_at: item.published_at,
            age: time_since(item.published_at, now),
            score: item.score.unwrap_or(0.0),
            breakdown: show_breakdown.then(|| explain(item, now)),
        })
        .collect();

    let failures = outcome
        .failures()
        .iter()
        .map(|f| JsonFailure {
            handle: &f.handle,
            error: f.error.to_string(),
        })
        .collect();

    serde_json::to_string_pretty(&JsonReport {
        status,
        message,
        items,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchError;
    use crate::transport::TransportError;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ranked_item(handle: &str, text: &str, link: &str, score: f64) -> Item {
        let mut item = Item::new(
            text.to_string(),
            link.to_string(),
            now() - Duration::hours(3),
            String::new(),
        );
        item.handle = handle.to_string();
        item.score = Some(score);
        item
    }

    #[test]
    fn test_short_link() {
        assert_eq!(
            short_link("https://nitter.net/jack/status/1?x=y#m"),
            "nitter.net/jack/status/1"
        );
        assert_eq!(short_link("not a url"), "not a url");
    }

    #[test]
    fn test_render_card() {
        let outcome = RunOutcome::Ranked {
            items: vec![ranked_item(
                "jack",
                "hello world",
                "https://nitter.net/jack/status/1",
                86.6,
            )],
            failures: Vec::new(),
        };
        let text = render_text(&outcome, now(), false);
        assert_eq!(
            text,
            "@jack • 3h ago  Score 87\nhello world\nnitter.net/jack/status/1\n"
        );
    }

    #[test]
    fn test_render_missing_link_falls_back_to_profile() {
        let outcome = RunOutcome::Ranked {
            items: vec![ranked_item("naval", "x", "", 1.0)],
            failures: Vec::new(),
        };
        let text = render_text(&outcome, now(), false);
        assert!(text.contains("twitter.com/naval"));
    }

    #[test]
    fn test_render_strips_control_chars() {
        let outcome = RunOutcome::Ranked {
            items: vec![ranked_item("jack", "evil\x1b[2Jtext", "", 1.0)],
            failures: Vec::new(),
        };
        let text = render_text(&outcome, now(), false);
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_render_breakdown_line() {
        let outcome = RunOutcome::Ranked {
            items: vec![ranked_item("jack", "#a", "", 1.0)],
            failures: Vec::new(),
        };
        let text = render_text(&outcome, now(), true);
        assert!(text.contains("hashtags 18"));
        assert!(text.contains("recency 42.0"));
    }

    #[test]
    fn test_render_empty_messages() {
        let no_handles = RunOutcome::Empty {
            reason: EmptyReason::NoHandles,
            failures: Vec::new(),
        };
        assert_eq!(
            render_text(&no_handles, now(), false),
            format!("{}\n", NO_HANDLES_MESSAGE)
        );

        let no_items = RunOutcome::Empty {
            reason: EmptyReason::NoItems,
            failures: vec![HandleFailure {
                handle: "ghost".into(),
                error: FetchError::Transport(TransportError::HttpStatus(404)),
            }],
        };
        let text = render_text(&no_items, now(), false);
        assert!(text.starts_with(NO_ITEMS_MESSAGE));
        assert!(text.contains("@ghost: Transport error: HTTP error: status 404"));
    }

    #[test]
    fn test_render_json() {
        let outcome = RunOutcome::Ranked {
            items: vec![ranked_item("jack", "hi", "", 12.0)],
            failures: Vec::new(),
        };
        let json = render_json(&outcome, now(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "ranked");
        assert_eq!(value["items"][0]["handle"], "jack");
        assert_eq!(value["items"][0]["link"], "https://twitter.com/jack");
        assert_eq!(value["items"][0]["age"], "3h ago");
        assert_eq!(value["items"][0]["breakdown"]["base"], 2.0);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_render_json_busy() {
        let json = render_json(&RunOutcome::Busy, now(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "busy");
        assert_eq!(value["message"], BUSY_MESSAGE);
        assert_eq!(value["items"].as_array().unwrap().len(), 0);
    }
}
