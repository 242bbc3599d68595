//! Decoders for vendor streaming responses.
//!
//! Each decoder is a state machine fed one SSE `data` payload at a time. It
//! returns the canonical events that payload produces, in order, and is
//! finally consumed by [`StreamDecoder::finish`] to produce the `final` event.
//! Because `finish` takes the decoder by value, nothing can be emitted after it.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicDecoder;
pub use gemini::GeminiDecoder;
pub use openai::OpenAiDecoder;

use serde::de::DeserializeOwned;

use super::canonical::ToolCall;
use super::event::{OutputEvent, Summary};
use crate::error::{RelayError, Result};

pub trait StreamDecoder {
    /// Decode one SSE `data` payload.
    fn decode(&mut self, data: &str) -> Result<Vec<OutputEvent>>;

    /// True once the vendor has signalled the end of the stream. Payloads
    /// arriving afterwards are not decoded.
    fn is_done(&self) -> bool {
        false
    }

    /// Flush accumulated state into the terminal `final` event.
    fn finish(self) -> Result<OutputEvent>
    where
        Self: Sized;
}

/// Parse a chunk, treating malformed vendor JSON as a stream failure.
pub(crate) fn parse_chunk<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        RelayError::stream(format!(
            "malformed vendor chunk ({e}): {}",
            super::truncate(data, 200)
        ))
    })
}

/// Buffers of everything emitted during a turn, turned into the final summary.
#[derive(Debug, Default)]
pub(crate) struct SummaryBuilder {
    thinking: Vec<String>,
    tool_calls: Vec<ToolCall>,
    content: Vec<String>,
    thinking_signature: Option<String>,
}

impl SummaryBuilder {
    pub fn push_thinking(&mut self, text: &str) {
        self.thinking.push(text.to_string());
    }

    pub fn push_content(&mut self, text: &str) {
        self.content.push(text.to_string());
    }

    pub fn push_tool_call(&mut self, call: ToolCall) {
        self.tool_calls.push(call);
    }

    pub fn set_signature(&mut self, signature: &str) {
        if !signature.is_empty() {
            self.thinking_signature = Some(signature.to_string());
        }
    }

    /// Summaries join thinking increments with `separator`; block-oriented
    /// vendors use a newline, token-oriented ones nothing.
    pub fn build(self, separator: &str) -> Summary {
        Summary {
            has_thinking: !self.thinking.is_empty(),
            thinking: self.thinking.join(separator),
            tool_calls: self.tool_calls,
            content: self.content,
            thinking_signature: self.thinking_signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_joins_thinking() {
        let mut builder = SummaryBuilder::default();
        builder.push_thinking("one");
        builder.push_thinking("two");
        builder.push_content("text");
        builder.push_tool_call(ToolCall::new("1", "f", json!({})));

        let summary = builder.build("\n");

        assert_eq!(summary.thinking, "one\ntwo");
        assert!(summary.has_thinking);
        assert_eq!(summary.content, vec!["text".to_string()]);
        assert_eq!(summary.tool_calls.len(), 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SummaryBuilder::default().build("");
        assert!(!summary.has_thinking);
        assert_eq!(summary.thinking, "");
        assert!(summary.thinking_signature.is_none());
    }

    #[test]
    fn test_malformed_chunk_is_stream_error() {
        let err = parse_chunk::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::StreamError);
    }
}
