//! Feed markup → [`Item`]s.
//!
//! Three shapes are understood, tried in order until one yields entries:
//!
//! 1. RSS `<item>` elements, scanned with a streaming XML reader
//! 2. Any other syndication dialect `feed-rs` knows (Atom, JSON Feed, RSS 1.0)
//! 3. A mirror's HTML timeline page, via regex extraction of `tweet-content` blocks
//!
//! Nothing here returns an error: malformed or unrecognized input yields an
//! empty vector, and an unparseable date falls back to the supplied clock.
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::item::Item;
use crate::util::strip_markup;

/// Parses feed markup, using the current time for entries without a usable date.
pub fn parse(raw: &str) -> Vec<Item> {
    parse_at(raw, Utc::now())
}

/// Parses feed markup, using `now` for entries without a usable date.
pub fn parse_at(raw: &str, now: DateTime<Utc>) -> Vec<Item> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    match scan_rss_items(raw) {
        Ok(entries) if !entries.is_empty() => {
            return entries.into_iter().map(|e| e.into_item(now)).collect();
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "Markup is not well-formed XML"),
    }

    let items = parse_syndication(raw, now);
    if !items.is_empty() {
        return items;
    }

    if raw.contains("tweet-content") {
        return parse_html_timeline(raw, now);
    }

    Vec::new()
}

// ============================================================================
// RSS
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

#[derive(Debug, Default)]
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
}

impl RawEntry {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn into_item(self, now: DateTime<Utc>) -> Item {
        let description = self.description.unwrap_or_default();
        let title = self.title.as_deref().map(strip_markup).unwrap_or_default();
        let text = if title.is_empty() {
            strip_markup(&description)
        } else {
            title
        };

        let published_at = self
            .pub_date
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or(now);

        Item::new(
            text,
            self.link.map(|l| l.trim().to_string()).unwrap_or_default(),
            published_at,
            description,
        )
    }
}

/// Collects every `<item>` in document order, wherever it is nested.
///
/// Any XML error discards the whole document, so a half-parsed page never
/// produces a partial feed.
fn scan_rss_items(raw: &str) -> Result<Vec<RawEntry>, quick_xml::Error> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; unknown
    // entities stay as literal text and are decoded later by strip_markup.
    // Untrimmed: a field can mix text and CDATA, and the whitespace between
    // the pieces separates words. strip_markup collapses it later.
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(false);

    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    let mut field: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"item" => {
                    current = Some(RawEntry::default());
                    field = None;
                }
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" if current.is_some() => field = Some(Field::Link),
                b"description" if current.is_some() => field = Some(Field::Description),
                b"pubDate" if current.is_some() => field = Some(Field::PubDate),
                _ => {}
            },
            // A self-closing <item/> is still an entry, just an empty one
            Event::Empty(e) if e.name().as_ref() == b"item" => {
                entries.push(RawEntry::default());
            }
            Event::End(e) => match e.name().as_ref() {
                b"item" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                }
                b"title" | b"link" | b"description" | b"pubDate" => field = None,
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    match t.unescape() {
                        Ok(text) => entry.push(f, &text),
                        // HTML entities such as &nbsp; are not XML builtins
                        Err(_) => entry.push(f, &String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.push(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// RFC 2822 (RSS `pubDate`), then RFC 3339 (Atom-style) as a fallback.
fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// ============================================================================
// Other syndication formats
// ============================================================================

fn parse_syndication(raw: &str, now: DateTime<Utc>) -> Vec<Item> {
    let feed = match feed_rs::parser::parse(raw.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::debug!(error = %e, "Not a recognized syndication feed");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .map(|entry| {
            let raw_description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| strip_markup(&t.content))
                .unwrap_or_default();
            let text = if title.is_empty() {
                strip_markup(&raw_description)
            } else {
                title
            };
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated).unwrap_or(now);

            Item::new(text, link, published_at, raw_description)
        })
        .collect()
}

// ============================================================================
// HTML timeline fallback
// ============================================================================

static RE_TWEET_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="tweet-content[^"]*"[^>]*>(.*?)</div>"#)
        .expect("static regex")
});
static RE_TWEET_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*class="tweet-link"[^>]*href="([^"]*)""#).expect("static regex")
});
static RE_TWEET_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="tweet-date"[^>]*>\s*<a[^>]*title="([^"]*)""#).expect("static regex")
});

/// Mirror timeline dates look like `Mar 21, 2006 · 8:50 PM UTC`.
const TIMELINE_DATE_FORMAT: &str = "%b %d, %Y · %I:%M %p UTC";

/// Extracts posts from a timeline page.
///
/// Each `tweet-content` block is one post; its link and date are the last
/// `tweet-link` / `tweet-date` seen between the previous block and this one.
fn parse_html_timeline(raw: &str, now: DateTime<Utc>) -> Vec<Item> {
    let mut items = Vec::new();
    let mut segment_start = 0;

    for caps in RE_TWEET_CONTENT.captures_iter(raw) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let segment = &raw[segment_start..whole.start()];
        segment_start = whole.end();

        let link = RE_TWEET_LINK
            .captures_iter(segment)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
            .unwrap_or_default();

        let published_at = RE_TWEET_DATE
            .captures_iter(segment)
            .last()
            .and_then(|c| c.get(1))
            .and_then(|m| parse_timeline_date(m.as_str()))
            .unwrap_or(now);

        let raw_description = body.as_str().to_string();
        items.push(Item::new(
            strip_markup(&raw_description),
            link,
            published_at,
            raw_description,
        ));
    }

    tracing::debug!(count = items.len(), "Extracted posts from HTML timeline");
    items
}

fn parse_timeline_date(title: &str) -> Option<DateTime<Utc>> {
    let decoded = html_escape::decode_html_entities(title);
    NaiveDateTime::parse_from_str(decoded.trim(), TIMELINE_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
