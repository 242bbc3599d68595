//! Canonical turns → OpenAI Chat Completions `messages`.
//!
//! Tool activity is replayed as plain text rather than native `tool_calls`
//! entries, so every message here is a `{role, content}` pair. The system
//! message is added by the adapter, not here.

use crate::error::Result;
use crate::translate::canonical::{llm_turns, Role, ToolCall, Turn};
use crate::translate::openai_types::ChatMessage;

pub fn openai_messages(turns: &[Turn]) -> Result<Vec<ChatMessage>> {
    llm_turns(turns)
        .map(|turn| match turn.role {
            Role::Assistant => translate_assistant_turn(turn),
            Role::User => translate_user_turn(turn),
        })
        .collect()
}

fn translate_assistant_turn(turn: &Turn) -> Result<ChatMessage> {
    // Validate even when content wins, so a malformed turn never slips through.
    let call = turn.single_tool_call()?;

    let content = if turn.has_content() {
        turn.content.clone()
    } else if let Some(call) = call {
        running_tool_text(call)
    } else if let Some(thinking) = turn.thinking() {
        thinking.to_string()
    } else {
        // Nothing to replay as the assistant; fall back to a plain text turn.
        return Ok(ChatMessage::new("user", turn.content.clone()));
    };

    Ok(ChatMessage::new("assistant", content))
}

fn translate_user_turn(turn: &Turn) -> Result<ChatMessage> {
    let content = match turn.single_tool_call()? {
        Some(call) => format!(
            "Result of tool {} with id: {}: \n{}",
            call.name, call.id, turn.content
        ),
        None => turn.content.clone(),
    };

    Ok(ChatMessage::new("user", content))
}

fn running_tool_text(call: &ToolCall) -> String {
    format!(
        "Running tool {} with id: {} and arguments: {}",
        call.name,
        call.id,
        call.input_value()
    )
}
