//! Anthropic Messages SSE → canonical events.
//!
//! Blocks are reassembled from their deltas and forwarded whole when the
//! vendor closes them, so each `thinking`, `content` or `tool_call` event
//! carries one complete block.

use std::collections::BTreeMap;

use serde_json::json;

use super::{parse_chunk, StreamDecoder, SummaryBuilder};
use crate::error::{RelayError, Result};
use crate::translate::anthropic_types::{BlockDelta, StartBlock, StreamEvent, StreamUsage};
use crate::translate::canonical::ToolCall;
use crate::translate::event::{OutputEvent, ToolCallNotice, UsageMetadata, VendorBlock};
use crate::vendor::Vendor;

#[derive(Debug)]
enum OpenBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        signature: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        partial_json: String,
    },
    /// Block types we do not forward (e.g. `redacted_thinking`).
    Skipped,
}

#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    blocks: BTreeMap<usize, OpenBlock>,
    usage: StreamUsage,
    finish_reason: Option<String>,
    stopped: bool,
    summary: SummaryBuilder,
}

impl AnthropicDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge_usage(&mut self, usage: &StreamUsage) {
        // message_delta repeats only the counters that changed
        if usage.input_tokens.is_some() {
            self.usage.input_tokens = usage.input_tokens;
        }
        if usage.output_tokens.is_some() {
            self.usage.output_tokens = usage.output_tokens;
        }
        if usage.cache_creation_input_tokens.is_some() {
            self.usage.cache_creation_input_tokens = usage.cache_creation_input_tokens;
        }
        if usage.cache_read_input_tokens.is_some() {
            self.usage.cache_read_input_tokens = usage.cache_read_input_tokens;
        }
    }

    fn apply_delta(&mut self, index: usize, delta: BlockDelta) -> Result<()> {
        let block = self.blocks.get_mut(&index).ok_or_else(|| {
            RelayError::stream(format!("delta for unopened content block {index}"))
        })?;

        match (block, delta) {
            (OpenBlock::Text { text }, BlockDelta::TextDelta { text: more }) => text.push_str(&more),
            (OpenBlock::Thinking { thinking, .. }, BlockDelta::ThinkingDelta { thinking: more }) => {
                thinking.push_str(&more)
            }
            (OpenBlock::Thinking { signature, .. }, BlockDelta::SignatureDelta { signature: sig }) => {
                signature.push_str(&sig)
            }
            (OpenBlock::ToolUse { partial_json, .. }, BlockDelta::InputJsonDelta { partial_json: more }) => {
                partial_json.push_str(&more)
            }
            (_, BlockDelta::Other) | (OpenBlock::Skipped, _) => {}
            (block, delta) => {
                tracing::debug!(?block, ?delta, "ignoring mismatched content block delta");
            }
        }
        Ok(())
    }

    fn close_block(&mut self, index: usize) -> Result<Option<OutputEvent>> {
        let block = self.blocks.remove(&index).ok_or_else(|| {
            RelayError::stream(format!("stop for unopened content block {index}"))
        })?;

        let event = match block {
            OpenBlock::Thinking {
                thinking,
                signature,
            } => {
                self.summary.push_thinking(&thinking);
                self.summary.set_signature(&signature);
                let raw = json!({"type": "thinking", "thinking": thinking, "signature": signature});
                OutputEvent::Thinking {
                    content: thinking,
                    block: Some(VendorBlock::new(raw)),
                }
            }
            OpenBlock::Text { text } => {
                self.summary.push_content(&text);
                let raw = json!({"type": "text", "text": text});
                OutputEvent::Content {
                    content: text,
                    block: Some(VendorBlock::new(raw)),
                }
            }
            OpenBlock::ToolUse {
                id,
                name,
                input,
                partial_json,
            } => {
                let input = if partial_json.trim().is_empty() {
                    if input.is_null() {
                        json!({})
                    } else {
                        input
                    }
                } else {
                    serde_json::from_str(&partial_json).map_err(|e| {
                        RelayError::stream(format!("invalid input JSON for tool {name}: {e}"))
                    })?
                };
                let call = ToolCall::new(id, name, input);
                self.summary.push_tool_call(call.clone());
                OutputEvent::ToolCall {
                    tool_call: ToolCallNotice::Complete(call),
                }
            }
            OpenBlock::Skipped => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<OutputEvent>> {
        let event: StreamEvent = parse_chunk(data)?;
        let mut events = Vec::new();

        match event {
            StreamEvent::MessageStart { message } => {
                if let Some(usage) = &message.usage {
                    self.merge_usage(usage);
                }
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let block = match content_block {
                    StartBlock::Text { text } => OpenBlock::Text { text },
                    StartBlock::Thinking {
                        thinking,
                        signature,
                    } => OpenBlock::Thinking {
                        thinking,
                        signature: signature.unwrap_or_default(),
                    },
                    StartBlock::ToolUse { id, name, input } => OpenBlock::ToolUse {
                        id,
                        name,
                        input,
                        partial_json: String::new(),
                    },
                    StartBlock::Other => OpenBlock::Skipped,
                };
                self.blocks.insert(index, block);
            }
            StreamEvent::ContentBlockDelta { index, delta } => self.apply_delta(index, delta)?,
            StreamEvent::ContentBlockStop { index } => {
                events.extend(self.close_block(index)?);
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.finish_reason = delta.stop_reason;
                }
                if let Some(usage) = &usage {
                    self.merge_usage(usage);
                }
            }
            StreamEvent::MessageStop => self.stopped = true,
            StreamEvent::Ping | StreamEvent::Unknown => {}
            StreamEvent::Error { error } => {
                return Err(RelayError::stream(format!(
                    "{}: {}",
                    error.error_type, error.message
                )));
            }
        }

        Ok(events)
    }

    fn is_done(&self) -> bool {
        self.stopped
    }

    fn finish(self) -> Result<OutputEvent> {
        if !self.stopped {
            return Err(RelayError::stream(
                "Anthropic stream ended before message_stop",
            ));
        }

        Ok(OutputEvent::Final {
            sdk: Vendor::Anthropic,
            finish_reason: self.finish_reason,
            usage_metadata: UsageMetadata {
                input_tokens: self.usage.input_tokens.unwrap_or(0),
                output_tokens: self.usage.output_tokens.unwrap_or(0),
                cache_input_tokens: self.usage.cache_creation_input_tokens.unwrap_or(0),
                cache_read_tokens: self.usage.cache_read_input_tokens.unwrap_or(0),
            },
            summary: self.summary.build("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&str]) -> Result<Vec<OutputEvent>> {
        let mut decoder = AnthropicDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.decode(chunk)?);
        }
        events.push(decoder.finish()?);
        Ok(events)
    }

    const MESSAGE_START: &str = r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","content":[],"model":"claude-sonnet-4-20250514","usage":{"input_tokens":25,"cache_creation_input_tokens":10,"cache_read_input_tokens":5,"output_tokens":1}}}"#;

    #[test]
    fn test_thinking_text_and_tool_use() {
        let events = run(&[
            MESSAGE_START,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Let me "}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"check."}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"EqQB"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Checking"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}"#,
            r#"{"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"{\"location\":"}}"#,
            r#"{"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"\"Paris\"}"}}"#,
            r#"{"type":"content_block_stop","index":2}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use","stop_sequence":null},"usage":{"output_tokens":42}}"#,
            r#"{"type":"message_stop"}"#,
        ])
        .unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].event_name(), "thinking");
        assert_eq!(events[1].event_name(), "content");
        match &events[2] {
            OutputEvent::ToolCall {
                tool_call: ToolCallNotice::Complete(call),
            } => {
                assert_eq!(call.id, "toolu_1");
                assert_eq!(call.input, json!({"location": "Paris"}));
            }
            other => panic!("unexpected event {other:?}"),
        }

        match &events[3] {
            OutputEvent::Final {
                sdk,
                finish_reason,
                usage_metadata,
                summary,
            } => {
                assert_eq!(*sdk, Vendor::Anthropic);
                assert_eq!(finish_reason.as_deref(), Some("tool_use"));
                assert_eq!(
                    *usage_metadata,
                    UsageMetadata {
                        input_tokens: 25,
                        output_tokens: 42,
                        cache_input_tokens: 10,
                        cache_read_tokens: 5,
                    }
                );
                assert_eq!(summary.thinking, "Let me check.");
                assert!(summary.has_thinking);
                assert_eq!(summary.content, vec!["Checking".to_string()]);
                assert_eq!(summary.tool_calls.len(), 1);
                assert_eq!(summary.thinking_signature.as_deref(), Some("EqQB"));
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn test_thinking_block_is_forwarded_verbatim() {
        let events = run(&[
            MESSAGE_START,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hmm"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ])
        .unwrap();

        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(
            value,
            json!({"type": "thinking", "content": "hmm", "block": {"type": "thinking", "thinking": "hmm", "signature": ""}})
        );
    }

    #[test]
    fn test_tool_without_arguments_gets_empty_object() {
        let events = run(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_2","name":"list","input":{}}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ])
        .unwrap();

        match &events[0] {
            OutputEvent::ToolCall {
                tool_call: ToolCallNotice::Complete(call),
            } => assert_eq!(call.input, json!({})),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_usage_zero_filled_when_absent() {
        let events = run(&[r#"{"type":"ping"}"#, r#"{"type":"message_stop"}"#]).unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            OutputEvent::Final {
                usage_metadata,
                finish_reason,
                ..
            } => {
                assert_eq!(*usage_metadata, UsageMetadata::default());
                assert!(finish_reason.is_none());
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn test_error_event_fails_stream() {
        let err = run(&[
            MESSAGE_START,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ])
        .unwrap_err();

        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_truncated_stream_fails() {
        assert!(run(&[MESSAGE_START]).is_err());
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let events = run(&[
            r#"{"type":"some_future_event","payload":1}"#,
            r#"{"type":"message_stop"}"#,
        ])
        .unwrap();

        assert!(events[0].is_final());
    }
}
