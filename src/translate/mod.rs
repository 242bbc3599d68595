//! Normalization between the canonical conversation model and vendor formats.
//!
//! Requests go canonical → vendor through [`request`]; vendor streams come
//! back through the decoders in [`streaming`]. Everything in here is pure
//! (no I/O).

pub mod anthropic_types;
pub mod canonical;
pub mod event;
pub mod gemini_types;
pub mod openai_types;
pub mod request;
pub mod streaming;

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
