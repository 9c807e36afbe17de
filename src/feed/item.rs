use chrono::{DateTime, Utc};

/// One normalized post.
///
/// Built by the parser with `handle` empty and `score` unset; the fetcher
/// stamps the handle and the pipeline attaches the score.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Tag-stripped, single-spaced body text. Empty when nothing could be extracted.
    pub text: String,
    /// Link to the original post, or empty.
    pub link: String,
    /// Publish time; the parse-time clock when the source date was missing or bad.
    pub published_at: DateTime<Utc>,
    /// Source markup before stripping, kept for the engagement heuristics.
    pub raw_description: String,
    /// Owning handle (lowercase, no `@`).
    pub handle: String,
    /// Relevance score, `None` until scored.
    pub score: Option<f64>,
}

impl Item {
    pub fn new(
        text: String,
        link: String,
        published_at: DateTime<Utc>,
        raw_description: String,
    ) -> Self {
        Self {
            text,
            link,
            published_at,
            raw_description,
            handle: String::new(),
            score: None,
        }
    }

    /// Link to show for this item: its own, or the handle's profile when missing.
    pub fn display_link(&self) -> String {
        if !self.link.is_empty() {
            self.link.clone()
        } else if !self.handle.is_empty() {
            format!("https://twitter.com/{}", self.handle)
        } else {
            String::new()
        }
    }
}
