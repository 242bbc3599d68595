//! The vendor-independent conversation model supplied by callers.
//!
//! A [`Turn`] is one message of the conversation. Tool activity rides in
//! [`TurnMetadata::tool_calls`]: on assistant turns it is the call being replayed,
//! on user turns it identifies the call whose result is carried in `content`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    #[serde(default, deserialize_with = "content_as_text")]
    pub content: String,
    /// Turns kept for UI display only; never sent to a vendor.
    #[serde(default, rename = "ignoreInLLM")]
    pub ignore_in_llm: bool,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,
    /// Opaque replay token. Never parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<serde_json::Value>,
}

/// A tool invocation. Used both for replayed calls on inbound turns and for
/// the calls reported in a stream's final summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    /// Raw argument text as streamed by OpenAI-compatible vendors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            arguments: None,
        }
    }

    /// The call's input as a JSON value: `input` when set, else the parsed
    /// `arguments` text, else an empty object.
    pub fn input_value(&self) -> serde_json::Value {
        if !self.input.is_null() {
            return self.input.clone();
        }
        self.arguments
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| serde_json::from_str(a).ok())
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            ignore_in_llm: false,
            metadata: TurnMetadata::default(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(content)
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>, signature: Option<&str>) -> Self {
        self.metadata.thinking_content = Some(thinking.into());
        self.metadata.thinking_signature = signature.map(str::to_string);
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.metadata.tool_calls.push(call);
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore_in_llm = true;
        self
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Thinking text, only when it is non-blank.
    pub fn thinking(&self) -> Option<&str> {
        self.metadata
            .thinking_content
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// The single tool call a translator may read from this turn.
    ///
    /// Tool result turns carry exactly one result in `content`, so a turn
    /// listing more than one call cannot be represented and is rejected.
    pub fn single_tool_call(&self) -> Result<Option<&ToolCall>> {
        match self.metadata.tool_calls.as_slice() {
            [] => Ok(None),
            [call] => Ok(Some(call)),
            calls => Err(RelayError::translation(format!(
                "{:?} turn carries {} tool calls; split them into one turn per call",
                self.role,
                calls.len()
            ))),
        }
    }
}

/// Turns that should reach a vendor, in order.
pub fn llm_turns(turns: &[Turn]) -> impl Iterator<Item = &Turn> {
    turns.iter().filter(|t| !t.ignore_in_llm)
}

fn content_as_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
