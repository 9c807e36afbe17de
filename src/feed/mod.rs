//! Per-handle feed retrieval and parsing.
//!
//! - [`parser`] turns a feed body (RSS, Atom/JSON Feed, or a timeline HTML
//!   page) into [`Item`]s in document order, never failing
//! - [`fetch_for_handle`] builds the handle's feed URL, retrieves it through a
//!   [`Transport`](crate::transport::Transport) and keeps the first N items
//!
//! # Example
//!
//! ```
//! use toptweets::feed::parse;
//!
//! let rss = r#"<rss><channel><item><title>hello</title></item></channel></rss>"#;
//! let items = parse(rss);
//! assert_eq!(items[0].text, "hello");
//! ```

mod fetcher;
mod item;
pub mod parser;

pub use fetcher::{
    feed_url, fetch_for_handle, fetch_for_handle_at, validate_source_base, FetchError,
};
pub use item::Item;
pub use parser::{parse, parse_at};
