//! Canonical turns → Gemini `contents`.

use serde_json::json;

use crate::error::Result;
use crate::translate::canonical::{llm_turns, Role, Turn};
use crate::translate::gemini_types::{Content, FunctionCall, FunctionResponse, Part};

pub fn gemini_contents(turns: &[Turn]) -> Result<Vec<Content>> {
    llm_turns(turns).map(translate_turn).collect()
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User => "user",
    }
}

fn translate_turn(turn: &Turn) -> Result<Content> {
    let signature = turn
        .metadata
        .thinking_signature
        .clone()
        .filter(|s| !s.is_empty());

    let call = turn.single_tool_call()?;

    let part = match (turn.role, call) {
        (Role::Assistant, Some(call)) => Part {
            function_call: Some(FunctionCall {
                id: non_empty(&call.id),
                name: call.name.clone(),
                args: call.input_value(),
            }),
            thought_signature: signature,
            ..Part::default()
        },
        (Role::Assistant, None) if turn.thinking().is_some() => Part {
            text: turn.thinking().map(str::to_string),
            thought_signature: signature,
            ..Part::default()
        },
        // Results are always wrapped under `data`, whatever their shape.
        (Role::User, Some(call)) => Part {
            function_response: Some(FunctionResponse {
                id: non_empty(&call.id),
                name: call.name.clone(),
                response: json!({ "data": turn.content }),
            }),
            ..Part::default()
        },
        _ => Part {
            text: Some(turn.content.clone()),
            ..Part::default()
        },
    };

    Ok(Content {
        role: Some(gemini_role(turn.role).to_string()),
        parts: vec![part],
    })
}

fn non_empty(id: &str) -> Option<String> {
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::canonical::ToolCall;

    #[test]
    fn test_roles_are_remapped() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello")];

        let contents = gemini_contents(&turns).unwrap();

        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_function_response_wraps_result_in_data() {
        let call = ToolCall::new("fc_1", "get_weather", json!({"location": "Oslo"}));
        let turn = Turn::user("result text").with_tool_call(call);

        let contents = gemini_contents(&[turn]).unwrap();

        let response = contents[0].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "get_weather");
        assert_eq!(response.id.as_deref(), Some("fc_1"));
        assert_eq!(response.response, json!({"data": "result text"}));
    }

    #[test]
    fn test_function_call_carries_signature_on_part() {
        let call = ToolCall::new("fc_1", "get_weather", json!({"location": "Oslo"}));
        let turn = Turn::assistant("")
            .with_thinking("need weather", Some("c2lnbmF0dXJl"))
            .with_tool_call(call);

        let contents = gemini_contents(&[turn]).unwrap();

        let part = &contents[0].parts[0];
        assert_eq!(part.thought_signature.as_deref(), Some("c2lnbmF0dXJl"));
        let fc = part.function_call.as_ref().unwrap();
        assert_eq!(fc.name, "get_weather");
        assert_eq!(fc.args, json!({"location": "Oslo"}));
        assert!(part.text.is_none());
    }

    #[test]
    fn test_thinking_turn_sends_thinking_text() {
        let turn = Turn::assistant("final answer").with_thinking("reasoning", Some("sig"));

        let contents = gemini_contents(&[turn]).unwrap();

        assert_eq!(contents[0].parts[0].text.as_deref(), Some("reasoning"));
        assert_eq!(contents[0].parts[0].thought_signature.as_deref(), Some("sig"));
    }

    #[test]
    fn test_part_serializes_camel_case() {
        let call = ToolCall::new("fc_1", "f", json!({}));
        let turn = Turn::user("ok").with_tool_call(call);

        let value = serde_json::to_value(gemini_contents(&[turn]).unwrap()).unwrap();

        assert_eq!(
            value,
            json!([{"role": "user", "parts": [{"functionResponse": {"id": "fc_1", "name": "f", "response": {"data": "ok"}}}]}])
        );
    }

    #[test]
    fn test_multiple_tool_calls_rejected() {
        let turn = Turn::assistant("")
            .with_tool_call(ToolCall::new("a", "one", json!({})))
            .with_tool_call(ToolCall::new("b", "two", json!({})));

        assert!(gemini_contents(&[turn]).is_err());
    }

    #[test]
    fn test_ignored_turns_are_skipped() {
        let turns = vec![Turn::user("a").ignored(), Turn::user("b")];

        assert_eq!(gemini_contents(&turns).unwrap().len(), 1);
    }
}
