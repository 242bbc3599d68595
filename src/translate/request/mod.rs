//! Translate canonical turns into each vendor's message format.
//!
//! All translators are pure and map one canonical turn to exactly one vendor
//! message. Turns flagged `ignoreInLLM` are dropped here as well as by the
//! caller, so translating an unfiltered conversation is safe.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::anthropic_messages;
pub use gemini::gemini_contents;
pub use openai::openai_messages;
