use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Tags that separate words when rendered; replaced with a space, not removed.
static RE_BREAKING_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(?:br|/p|/div|/li|hr)\b[^>]*>").expect("static regex")
});
static RE_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

/// Removes markup from a feed fragment and returns plain, single-spaced text.
///
/// 1. Line-breaking tags (`<br>`, `</p>`, ...) become spaces
/// 2. Every other tag is dropped
/// 3. HTML entities are decoded (`&amp;` → `&`, `&nbsp;` → no-break space)
/// 4. Whitespace runs collapse to one ASCII space, ends trimmed
///
/// Entities are decoded after tags are removed, so an escaped `&lt;b&gt;`
/// survives as the literal text `<b>`.
///
/// ```
/// use toptweets::util::strip_markup;
///
/// assert_eq!(strip_markup("<p>Hello&nbsp;<b>world</b></p>"), "Hello world");
/// assert_eq!(strip_markup("a<br/>b"), "a b");
/// ```
pub fn strip_markup(s: &str) -> String {
    let spaced = RE_BREAKING_TAGS.replace_all(s, " ");
    let untagged = RE_TAGS.replace_all(&spaced, "");
    let decoded = html_escape::decode_html_entities(&untagged);
    collapse_whitespace(&decoded)
}

/// Collapses every whitespace run (including no-break spaces) to one space and trims.
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Calculates the display width of a string in terminal columns.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: &str = "...";

/// Truncates `s` to at most `max_width` terminal columns, appending "..." when cut.
///
/// Widths of 3 or less have no room for an ellipsis, so the result is just
/// the characters that fit.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width > ELLIPSIS.len() {
        max_width - ELLIPSIS.len()
    } else {
        max_width
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    if max_width > ELLIPSIS.len() {
        Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
    } else {
        Cow::Owned(s[..cut].to_string())
    }
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Post text comes from a third-party mirror and is printed straight to the
/// terminal, so CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ESC \`)
/// sequences are dropped along with C0 controls and DEL. Tab, newline and
/// carriage return are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_unsafe = |c: char| c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'));

    if !s.chars().any(is_unsafe) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    // parameter bytes until the final byte in 0x40..=0x7e
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_unsafe(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Compact relative age: `"3h ago"`, `"2d ago"`, `"just now"`.
///
/// Timestamps in the future of `now` read as "just now".
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const INTERVALS: [(&str, i64); 6] = [
        ("y", 31_536_000),
        ("mo", 2_592_000),
        ("d", 86_400),
        ("h", 3_600),
        ("m", 60),
        ("s", 1),
    ];

    let seconds = (now - then).num_seconds();
    for (label, secs) in INTERVALS {
        let val = seconds / secs;
        if val >= 1 {
            return format!("{}{} ago", val, label);
        }
    }
    "just now".to_string()
}
