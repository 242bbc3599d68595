//! Gemini `streamGenerateContent` chunks → canonical events.
//!
//! Gemini delivers function calls whole, so each one is forwarded as a
//! complete tool call without any accumulation.

use super::{parse_chunk, StreamDecoder, SummaryBuilder};
use crate::error::Result;
use crate::translate::canonical::ToolCall;
use crate::translate::event::{OutputEvent, ToolCallNotice, UsageMetadata, VendorBlock};
use crate::translate::gemini_types::{GenerateContentChunk, GeminiUsage, Part};
use crate::vendor::Vendor;

#[derive(Debug, Default)]
pub struct GeminiDecoder {
    finish_reason: Option<String>,
    usage: UsageMetadata,
    summary: SummaryBuilder,
}

impl GeminiDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_part(&mut self, part: &Part) -> Option<OutputEvent> {
        if let Some(signature) = &part.thought_signature {
            self.summary.set_signature(signature);
        }

        if part.thought == Some(true) {
            let text = part.text.clone().unwrap_or_default();
            self.summary.push_thinking(&text);
            return Some(OutputEvent::Thinking {
                content: text,
                block: VendorBlock::capture(part),
            });
        }

        if let Some(fc) = &part.function_call {
            let id = fc
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("gemini_{}", uuid::Uuid::new_v4().simple()));
            let call = ToolCall::new(id, fc.name.clone(), fc.args.clone());
            self.summary.push_tool_call(call.clone());
            return Some(OutputEvent::ToolCall {
                tool_call: ToolCallNotice::Complete(call),
            });
        }

        match part.text.as_deref() {
            Some(text) if !text.is_empty() => {
                self.summary.push_content(text);
                Some(OutputEvent::Content {
                    content: text.to_string(),
                    block: VendorBlock::capture(part),
                })
            }
            _ => None,
        }
    }
}

fn map_usage(usage: &GeminiUsage) -> UsageMetadata {
    let cached = usage.cached_content_token_count.unwrap_or(0);
    UsageMetadata {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        cache_input_tokens: cached,
        cache_read_tokens: cached,
    }
}

impl StreamDecoder for GeminiDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<OutputEvent>> {
        let chunk: GenerateContentChunk = parse_chunk(data)?;
        let mut events = Vec::new();

        if let Some(candidate) = chunk.candidates.first() {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    events.extend(self.decode_part(part));
                }
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason.clone();
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            self.usage = map_usage(usage);
        }

        Ok(events)
    }

    fn finish(self) -> Result<OutputEvent> {
        Ok(OutputEvent::Final {
            sdk: Vendor::Gemini,
            finish_reason: self.finish_reason,
            usage_metadata: self.usage,
            summary: self.summary.build("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(chunks: &[serde_json::Value]) -> Vec<OutputEvent> {
        let mut decoder = GeminiDecoder::new();
        let mut events = Vec::new();
        for c in chunks {
            events.extend(decoder.decode(&c.to_string()).unwrap());
        }
        events.push(decoder.finish().unwrap());
        events
    }

    #[test]
    fn test_parts_are_classified() {
        let events = run(&[
            json!({"candidates": [{"content": {"role": "model", "parts": [
                {"text": "considering", "thought": true},
                {"text": "Here you go"}
            ]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "get_weather", "args": {"location": "Rome"}}, "thoughtSignature": "c2ln"}
            ]}, "finishReason": "STOP"}],
              "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 12, "cachedContentTokenCount": 8}}),
        ]);

        let names: Vec<_> = events.iter().map(OutputEvent::event_name).collect();
        assert_eq!(names, vec!["thinking", "content", "tool_call", "final"]);

        match &events[3] {
            OutputEvent::Final {
                sdk,
                finish_reason,
                usage_metadata,
                summary,
            } => {
                assert_eq!(*sdk, Vendor::Gemini);
                assert_eq!(finish_reason.as_deref(), Some("STOP"));
                assert_eq!(
                    *usage_metadata,
                    UsageMetadata {
                        input_tokens: 30,
                        output_tokens: 12,
                        cache_input_tokens: 8,
                        cache_read_tokens: 8,
                    }
                );
                assert_eq!(summary.thinking, "considering");
                assert_eq!(summary.tool_calls[0].name, "get_weather");
                assert_eq!(summary.tool_calls[0].input, json!({"location": "Rome"}));
                assert!(summary.tool_calls[0].id.starts_with("gemini_"));
                assert_eq!(summary.thinking_signature.as_deref(), Some("c2ln"));
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn test_function_call_id_is_kept() {
        let events = run(&[json!({"candidates": [{"content": {"parts": [
            {"functionCall": {"id": "fc-7", "name": "f", "args": {}}}
        ]}}]})]);

        match &events[0] {
            OutputEvent::ToolCall {
                tool_call: ToolCallNotice::Complete(call),
            } => assert_eq!(call.id, "fc-7"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_latest_usage_wins() {
        let events = run(&[
            json!({"candidates": [{"content": {"parts": [{"text": "a"}]}}], "usageMetadata": {"promptTokenCount": 5}}),
            json!({"candidates": [{"content": {"parts": [{"text": "b"}]}, "finishReason": "MAX_TOKENS"}],
                   "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 9}}),
        ]);

        match events.last().unwrap() {
            OutputEvent::Final {
                usage_metadata,
                finish_reason,
                summary,
                ..
            } => {
                assert_eq!(usage_metadata.output_tokens, 9);
                assert_eq!(usage_metadata.cache_read_tokens, 0);
                assert_eq!(finish_reason.as_deref(), Some("MAX_TOKENS"));
                assert_eq!(summary.content, vec!["a".to_string(), "b".to_string()]);
                assert!(!summary.has_thinking);
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_without_candidates() {
        let events = run(&[json!({"usageMetadata": {"promptTokenCount": 3}})]);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_final());
    }
}
