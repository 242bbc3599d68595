//! OpenAI-compatible chat completion chunks → canonical events.
//!
//! Tool call arguments arrive as JSON text fragments spread over many chunks.
//! Fragments are forwarded as they come as partial `tool_call` notices, and
//! accumulated per call index; the complete calls only exist in the final
//! summary.

use std::collections::BTreeMap;

use super::{parse_chunk, StreamDecoder, SummaryBuilder};
use crate::error::Result;
use crate::translate::canonical::ToolCall;
use crate::translate::event::{OutputEvent, ToolCallDelta, ToolCallNotice, UsageMetadata, VendorBlock};
use crate::translate::openai_types::{ChatCompletionChunk, ChatUsage, ChunkToolCall};
use crate::vendor::Vendor;

const DONE_SENTINEL: &str = "[DONE]";

/// Accumulator for one streamed tool call.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PendingToolCall {
    fn absorb(&mut self, delta: &ChunkToolCall) {
        if self.id.is_none() {
            self.id = delta.id.clone().filter(|id| !id.is_empty());
        }
        if let Some(function) = &delta.function {
            if self.name.is_none() {
                self.name = function.name.clone().filter(|n| !n.is_empty());
            }
            if let Some(fragment) = &function.arguments {
                self.arguments.push_str(fragment);
            }
        }
    }

    fn into_tool_call(self, index: u64) -> ToolCall {
        let id = self
            .id
            .unwrap_or_else(|| format!("call_{}_{index}", uuid::Uuid::new_v4().simple()));
        let input = if self.arguments.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&self.arguments).unwrap_or_else(|e| {
                tracing::warn!(%id, error = %e, "tool call arguments are not valid JSON");
                serde_json::Value::Null
            })
        };
        ToolCall {
            id,
            name: self.name.unwrap_or_default(),
            input,
            arguments: Some(self.arguments),
        }
    }
}

#[derive(Debug, Default)]
pub struct OpenAiDecoder {
    tool_calls: BTreeMap<u64, PendingToolCall>,
    finish_reason: Option<String>,
    usage: UsageMetadata,
    done: bool,
    summary: SummaryBuilder,
}

impl OpenAiDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn map_usage(usage: &ChatUsage) -> UsageMetadata {
    UsageMetadata {
        input_tokens: usage.prompt_tokens.unwrap_or(0),
        output_tokens: usage.completion_tokens.unwrap_or(0),
        cache_input_tokens: 0,
        cache_read_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens)
            .unwrap_or(0),
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl StreamDecoder for OpenAiDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<OutputEvent>> {
        if data.trim() == DONE_SENTINEL {
            self.done = true;
            return Ok(Vec::new());
        }

        let chunk: ChatCompletionChunk = parse_chunk(data)?;
        let mut events = Vec::new();

        if let Some(choice) = chunk.choices.first() {
            let delta = &choice.delta;

            if let Some(reasoning) = non_empty(&delta.reasoning).or(non_empty(&delta.reasoning_content)) {
                self.summary.push_thinking(reasoning);
                events.push(OutputEvent::Thinking {
                    content: reasoning.to_string(),
                    block: VendorBlock::capture(&chunk),
                });
            }

            if let Some(content) = non_empty(&delta.content) {
                self.summary.push_content(content);
                events.push(OutputEvent::Content {
                    content: content.to_string(),
                    block: VendorBlock::capture(&chunk),
                });
            }

            if let Some(tool_calls) = delta.tool_calls.as_ref().filter(|t| !t.is_empty()) {
                let mut deltas = Vec::with_capacity(tool_calls.len());
                for tc in tool_calls {
                    self.tool_calls.entry(tc.index).or_default().absorb(tc);
                    let function = tc.function.as_ref();
                    deltas.push(ToolCallDelta {
                        index: tc.index,
                        id: tc.id.clone(),
                        name: function.and_then(|f| f.name.clone()),
                        arguments: function.and_then(|f| f.arguments.clone()),
                    });
                }
                events.push(OutputEvent::ToolCall {
                    tool_call: ToolCallNotice::Partial(deltas),
                });
            }

            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }

        // Usage normally rides alone on the last chunk, but some providers
        // attach it to the finish chunk. The latest report wins either way.
        if let Some(usage) = &chunk.usage {
            self.usage = map_usage(usage);
        }

        Ok(events)
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> Result<OutputEvent> {
        let mut summary = self.summary;
        for (index, pending) in self.tool_calls {
            summary.push_tool_call(pending.into_tool_call(index));
        }

        Ok(OutputEvent::Final {
            sdk: Vendor::OpenAi,
            finish_reason: self.finish_reason,
            usage_metadata: self.usage,
            summary: summary.build(""),
        })
    }
}
