//! Canonical turns → Anthropic Messages API `messages`.

use crate::error::Result;
use crate::translate::anthropic_types::{ContentBlock, Message, MessageContent, Role};
use crate::translate::canonical::{llm_turns, Role as TurnRole, Turn};

/// Translate a conversation into Anthropic messages.
///
/// Thinking blocks are only replayed when `thinking_supported` is set, since
/// Anthropic rejects them for models without extended thinking.
pub fn anthropic_messages(turns: &[Turn], thinking_supported: bool) -> Result<Vec<Message>> {
    llm_turns(turns)
        .map(|turn| match turn.role {
            TurnRole::Assistant => Ok(translate_assistant_turn(turn, thinking_supported)),
            TurnRole::User => translate_user_turn(turn),
        })
        .collect()
}

fn translate_assistant_turn(turn: &Turn, thinking_supported: bool) -> Message {
    let mut blocks = Vec::new();

    if thinking_supported {
        if let Some(thinking) = turn.thinking() {
            blocks.push(ContentBlock::Thinking {
                thinking: thinking.to_string(),
                signature: turn
                    .metadata
                    .thinking_signature
                    .clone()
                    .unwrap_or_default(),
            });
        }
    }

    if turn.has_content() {
        blocks.push(ContentBlock::Text {
            text: turn.content.clone(),
        });
    }

    blocks.extend(
        turn.metadata
            .tool_calls
            .iter()
            .map(|call| ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input_value(),
            }),
    );

    Message {
        role: Role::Assistant,
        content: MessageContent::Blocks(blocks),
    }
}

fn translate_user_turn(turn: &Turn) -> Result<Message> {
    let content = match turn.single_tool_call()? {
        Some(call) => MessageContent::Blocks(vec![ContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: turn.content.clone(),
        }]),
        None => MessageContent::Text(turn.content.clone()),
    };

    Ok(Message {
        role: Role::User,
        content,
    })
}
