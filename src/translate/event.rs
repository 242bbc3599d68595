//! Canonical output events emitted to the client, whatever the vendor.
//!
//! Every stream produces zero or more `thinking`, `content` and `tool_call`
//! events in vendor-chunk arrival order, followed by exactly one `final`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::canonical::ToolCall;
use crate::vendor::Vendor;

/// Raw vendor payload attached to an event for debugging.
///
/// Opaque on purpose: it is serialized as-is and nothing downstream reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorBlock(serde_json::Value);

impl VendorBlock {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    pub fn capture<T: Serialize>(raw: &T) -> Option<Self> {
        serde_json::to_value(raw).ok().map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Thinking {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block: Option<VendorBlock>,
    },
    Content {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block: Option<VendorBlock>,
    },
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCallNotice,
    },
    Final {
        sdk: Vendor,
        #[serde(rename = "finishReason")]
        finish_reason: Option<String>,
        #[serde(rename = "usageMetadata")]
        usage_metadata: UsageMetadata,
        summary: Summary,
    },
}

impl OutputEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutputEvent::Thinking { .. } => "thinking",
            OutputEvent::Content { .. } => "content",
            OutputEvent::ToolCall { .. } => "tool_call",
            OutputEvent::Final { .. } => "final",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OutputEvent::Final { .. })
    }
}

/// What a `tool_call` event carries. Anthropic and Gemini deliver whole calls;
/// OpenAI-compatible vendors deliver argument fragments, which are only
/// complete in the final summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallNotice {
    Complete(ToolCall),
    Partial(Vec<ToolCallDelta>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Normalized token accounting. Figures a vendor does not report are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_input_tokens: u64,
    pub cache_read_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub thinking: String,
    pub has_thinking: bool,
    pub tool_calls: Vec<ToolCall>,
    pub content: Vec<String>,
    /// Last replay signature the vendor attached to reasoning, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_signature: Option<String>,
}

/// Receives canonical events, one call per event.
pub trait EventSink: Send {
    fn emit(&mut self, event: OutputEvent);
}

impl EventSink for Vec<OutputEvent> {
    fn emit(&mut self, event: OutputEvent) {
        self.push(event);
    }
}

impl EventSink for UnboundedSender<OutputEvent> {
    fn emit(&mut self, event: OutputEvent) {
        // A closed receiver means the client went away; the vendor stream
        // still runs to completion.
        if self.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_event_wire_shape() {
        let event = OutputEvent::Final {
            sdk: Vendor::Anthropic,
            finish_reason: Some("end_turn".to_string()),
            usage_metadata: UsageMetadata::default(),
            summary: Summary::default(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "final");
        assert_eq!(value["sdk"], "anthropic");
        assert_eq!(value["finishReason"], "end_turn");
        assert_eq!(
            value["usageMetadata"],
            json!({"inputTokens": 0, "outputTokens": 0, "cacheInputTokens": 0, "cacheReadTokens": 0})
        );
        assert_eq!(value["summary"]["hasThinking"], false);
    }

    #[test]
    fn test_content_event_keeps_vendor_block_verbatim() {
        let event = OutputEvent::Content {
            content: "hi".to_string(),
            block: Some(VendorBlock::new(json!({"type": "text", "text": "hi"}))),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "content", "content": "hi", "block": {"type": "text", "text": "hi"}}));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (mut tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.emit(OutputEvent::Content {
            content: "lost".to_string(),
            block: None,
        });
    }
}
