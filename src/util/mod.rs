//! Text helpers shared by the parser and the terminal renderer.
//!
//! - **Markup**: tag stripping, entity decoding and whitespace collapsing for feed fragments
//! - **Terminal safety**: control-sequence stripping and width-aware truncation
//! - **Time**: compact relative ages ("3h ago")

mod text;

pub use text::{
    collapse_whitespace, display_width, strip_control_chars, strip_markup, time_since,
    truncate_to_width,
};
