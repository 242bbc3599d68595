//! Tool definitions offered to the model, one schema array per vendor.
//!
//! The arrays are passed to the vendor unchanged. A catalog file only needs
//! the Anthropic form; the OpenAI and Gemini forms are derived from it when
//! absent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    #[serde(default)]
    pub anthropic: Vec<Value>,
    #[serde(default)]
    pub openai: Vec<Value>,
    #[serde(default)]
    pub gemini: Vec<Value>,
}

/// JSON Schema keywords Gemini's function declarations reject.
const GEMINI_UNSUPPORTED_KEYS: &[&str] = &["$schema", "additionalProperties"];

impl ToolCatalog {
    /// The stock catalog: a single `get_weather` tool.
    pub fn builtin() -> Self {
        Self::from_anthropic(vec![json!({
            "name": "get_weather",
            "description": "Get the current weather in a given location",
            "input_schema": {
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state, e.g. San Francisco, CA"
                    }
                },
                "required": ["location"]
            },
            "cache_control": {"type": "ephemeral"}
        })])
    }

    pub fn from_anthropic(tools: Vec<Value>) -> Self {
        Self {
            anthropic: tools,
            ..Self::default()
        }
        .fill_missing()
    }

    /// Load a catalog from a JSON file of the form
    /// `{"anthropic": [...], "openai": [...], "gemini": [...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!(
                "Failed to read tool catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog: Self = serde_json::from_str(&content).map_err(|e| {
            RelayError::config(format!("Invalid tool catalog {}: {}", path.display(), e))
        })?;
        Ok(catalog.fill_missing())
    }

    fn fill_missing(mut self) -> Self {
        if self.openai.is_empty() {
            self.openai = self.anthropic.iter().filter_map(openai_tool).collect();
        }
        if self.gemini.is_empty() {
            self.gemini = self.anthropic.iter().filter_map(gemini_declaration).collect();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.anthropic.is_empty() && self.openai.is_empty() && self.gemini.is_empty()
    }
}

fn name_and_schema(tool: &Value) -> Option<(&str, &str, Value)> {
    let name = tool.get("name")?.as_str()?;
    let description = tool.get("description").and_then(Value::as_str).unwrap_or("");
    let schema = tool
        .get("input_schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
    Some((name, description, schema))
}

fn openai_tool(tool: &Value) -> Option<Value> {
    let (name, description, parameters) = name_and_schema(tool)?;
    Some(json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    }))
}

fn gemini_declaration(tool: &Value) -> Option<Value> {
    let (name, description, mut parameters) = name_and_schema(tool)?;
    strip_keys(&mut parameters, GEMINI_UNSUPPORTED_KEYS);
    Some(json!({
        "name": name,
        "description": description,
        "parameters": parameters,
    }))
}

fn strip_keys(value: &mut Value, keys: &[&str]) {
    match value {
        Value::Object(map) => {
            for key in keys {
                map.remove(*key);
            }
            for child in map.values_mut() {
                strip_keys(child, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_keys(item, keys);
            }
        }
        _ => {}
    }
}
