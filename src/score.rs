//! Engagement heuristic for ranking posts.
//!
//! Every term is additive and uses a fixed constant, so a score can be
//! reproduced by hand from the post text, its raw description and its age:
//!
//! | term                 | value                                             |
//! |----------------------|---------------------------------------------------|
//! | base                 | `min(250, chars(text))`                           |
//! | hashtags             | `18 × count(#word)` in text                       |
//! | mentions             | `12 × count(@word)` in text                       |
//! | numbers              | `8 × count(digits, optional k/m suffix)` in text  |
//! | engagement keyword   | `+30` if raw description says like/retweet/reply  |
//! | engagement magnitude | `+40` if raw description has a `12k`/`3m` token   |
//! | recency              | `(24 − min(24, age_hours)) × 2`, at most 48       |
//!
//! The total is unbounded above and never negative.
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::feed::Item;

pub const BASE_LENGTH_CAP: usize = 250;
pub const HASHTAG_POINTS: f64 = 18.0;
pub const MENTION_POINTS: f64 = 12.0;
pub const NUMBER_POINTS: f64 = 8.0;
pub const ENGAGEMENT_KEYWORD_BONUS: f64 = 30.0;
pub const ENGAGEMENT_MAGNITUDE_BONUS: f64 = 40.0;
pub const RECENCY_WINDOW_HOURS: f64 = 24.0;
pub const RECENCY_POINTS_PER_HOUR: f64 = 2.0;

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_]+").expect("static regex"));
static RE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_]+").expect("static regex"));
static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+[kKmM]?").expect("static regex"));
// ASCII word boundaries: a letter like `é` does not join a keyword or count
static RE_ENGAGEMENT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)(?:likes?|retweets?|reply)(?-u:\b)").expect("static regex")
});
static RE_ENGAGEMENT_MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-9]+[km](?-u:\b)").expect("static regex"));

/// Per-term contributions to an item's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub hashtags: f64,
    pub mentions: f64,
    pub numbers: f64,
    pub engagement_keyword: f64,
    pub engagement_magnitude: f64,
    pub recency: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base
            + self.hashtags
            + self.mentions
            + self.numbers
            + self.engagement_keyword
            + self.engagement_magnitude
            + self.recency
    }
}

/// Scores `item` as of `now`.
pub fn score(item: &Item, now: DateTime<Utc>) -> f64 {
    explain(item, now).total()
}

/// Breaks the score of `item` as of `now` into its terms.
pub fn explain(item: &Item, now: DateTime<Utc>) -> ScoreBreakdown {
    let text = item.text.as_str();
    let raw = item.raw_description.to_lowercase();

    let count = |re: &Regex| re.find_iter(text).count() as f64;

    ScoreBreakdown {
        base: text.chars().count().min(BASE_LENGTH_CAP) as f64,
        hashtags: count(&RE_HASHTAG) * HASHTAG_POINTS,
        mentions: count(&RE_MENTION) * MENTION_POINTS,
        numbers: count(&RE_NUMBER) * NUMBER_POINTS,
        engagement_keyword: if RE_ENGAGEMENT_WORD.is_match(&raw) {
            ENGAGEMENT_KEYWORD_BONUS
        } else {
            0.0
        },
        engagement_magnitude: if RE_ENGAGEMENT_MAGNITUDE.is_match(&raw) {
            ENGAGEMENT_MAGNITUDE_BONUS
        } else {
            0.0
        },
        recency: recency_bonus(item.published_at, now),
    }
}

/// Newer posts earn up to 48 points, decaying linearly to 0 at 24 hours old.
/// Posts dated after `now` earn the full bonus.
pub fn recency_bonus(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = ((now - published_at).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    (RECENCY_WINDOW_HOURS - age_hours.min(RECENCY_WINDOW_HOURS)).max(0.0) * RECENCY_POINTS_PER_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(text: &str, raw: &str, age: Duration) -> Item {
        Item::new(text.to_string(), String::new(), now() - age, raw.to_string())
    }

    #[test]
    fn test_hashtags_scenario_by_hand() {
        let text = "Great news! #launch #launch";
        let b = explain(&item(text, "", Duration::days(2)), now());
        assert_eq!(b.base, 27.0);
        assert_eq!(b.hashtags, 36.0);
        assert_eq!(b.mentions, 0.0);
        assert_eq!(b.numbers, 0.0);
        assert_eq!(b.recency, 0.0);
        assert_eq!(b.total(), 63.0);
    }

    #[test]
    fn test_engagement_bonuses_combine() {
        let b = explain(&item("", "· 12K likes", Duration::days(2)), now());
        assert_eq!(b.engagement_keyword, 30.0);
        assert_eq!(b.engagement_magnitude, 40.0);
        assert_eq!(b.total(), 70.0);
    }

    #[test]
    fn test_engagement_keyword_needs_whole_word() {
        let b = explain(&item("", "likely unlikeable replying", Duration::days(2)), now());
        assert_eq!(b.engagement_keyword, 0.0);
        let b = explain(&item("", "3 Retweets", Duration::days(2)), now());
        assert_eq!(b.engagement_keyword, 30.0);
        assert_eq!(b.engagement_magnitude, 0.0);
    }

    #[test]
    fn test_engagement_magnitude_needs_bare_token() {
        let b = explain(&item("", "v12kb build", Duration::days(2)), now());
        assert_eq!(b.engagement_magnitude, 0.0);
        let b = explain(&item("", "reached 3M views", Duration::days(2)), now());
        assert_eq!(b.engagement_magnitude, 40.0);
    }

    #[test]
    fn test_engagement_boundaries_are_ascii() {
        let b = explain(&item("", "élikes", Duration::days(2)), now());
        assert_eq!(b.engagement_keyword, 30.0);
        let b = explain(&item("", "é12k", Duration::days(2)), now());
        assert_eq!(b.engagement_magnitude, 40.0);
        let b = explain(&item("", "12ké", Duration::days(2)), now());
        assert_eq!(b.engagement_magnitude, 40.0);
    }

    #[test]
    fn test_mentions_and_numbers() {
        let b = explain(&item("@alice and @bob saw 12K and 7", "", Duration::days(2)), now());
        assert_eq!(b.mentions, 24.0);
        assert_eq!(b.numbers, 16.0);
    }

    #[test]
    fn test_base_is_capped() {
        let long = "a".repeat(400);
        let b = explain(&item(&long, "", Duration::days(2)), now());
        assert_eq!(b.base, 250.0);
    }

    #[test]
    fn test_base_counts_characters_not_bytes() {
        let b = explain(&item("héllo", "", Duration::days(2)), now());
        assert_eq!(b.base, 5.0);
    }

    #[test]
    fn test_recency_linear_decay() {
        assert_eq!(recency_bonus(now(), now()), 48.0);
        assert_eq!(recency_bonus(now() - Duration::hours(6), now()), 36.0);
        assert_eq!(recency_bonus(now() - Duration::hours(24), now()), 0.0);
        assert_eq!(recency_bonus(now() - Duration::hours(100), now()), 0.0);
    }

    #[test]
    fn test_future_timestamp_gets_full_recency() {
        assert_eq!(recency_bonus(now() + Duration::hours(5), now()), 48.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let it = item("#a @b 1k", "2 replies · 5k likes", Duration::minutes(90));
        assert_eq!(score(&it, now()), score(&it, now()));
    }

    proptest! {
        #[test]
        fn prop_score_non_negative(
            text in ".{0,300}",
            raw in ".{0,200}",
            age_minutes in -10_000i64..100_000,
        ) {
            let it = item(&text, &raw, Duration::minutes(age_minutes));
            let s = score(&it, now());
            prop_assert!(s >= 0.0);
            prop_assert_eq!(s, explain(&it, now()).total());
        }
    }
}
