//! Vendor stream adapters.
//!
//! Each backend builds its vendor's streaming request, opens it, and feeds the
//! SSE body through that vendor's decoder into the caller's sink.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use secrecy::ExposeSecret;

use crate::error::{RelayError, Result};
use crate::logging::{LogEntry, LogLevel};
use crate::registry::ModelCapability;
use crate::translate::anthropic_types::{
    CacheControl, Message, MessagesRequest, SystemBlock, ThinkingConfig as AnthropicThinking,
};
use crate::translate::canonical::Turn;
use crate::translate::event::EventSink;
use crate::translate::gemini_types::{
    Content, GenerateContentRequest, GenerationConfig, Part, ThinkingConfig as GeminiThinking,
    ToolDeclarations,
};
use crate::translate::openai_types::{ChatCompletionRequest, ChatMessage, StreamOptions};
use crate::translate::request::{anthropic_messages, gemini_contents, openai_messages};
use crate::translate::streaming::{AnthropicDecoder, GeminiDecoder, OpenAiDecoder, StreamDecoder};
use crate::translate::truncate;
use crate::vendor::{ChatBackend, StreamRequest, Vendor};

pub struct AnthropicBackend;

pub struct OpenAiBackend;

pub struct GeminiBackend;

/// Build the Anthropic Messages request body.
pub fn anthropic_request(request: &StreamRequest<'_>, messages: Vec<Message>) -> MessagesRequest {
    let system = if request.system_prompt.is_empty() {
        Vec::new()
    } else {
        vec![SystemBlock {
            block_type: "text".to_string(),
            text: request.system_prompt.to_string(),
            cache_control: Some(CacheControl {
                cache_type: "ephemeral".to_string(),
            }),
        }]
    };

    // The vendor rejects a thinking budget that is not below max_tokens.
    let budget_tokens = request.options.anthropic_budget_tokens;
    let thinking = request.thinking && request.max_output_tokens > budget_tokens;

    MessagesRequest {
        model: request.capability.model_name.clone(),
        max_tokens: request.max_output_tokens,
        stream: true,
        thinking: thinking.then(|| AnthropicThinking {
            thinking_type: "enabled".to_string(),
            budget_tokens,
        }),
        system,
        tools: request.tools.anthropic.clone(),
        messages,
    }
}

/// Build the Chat Completions request body. The system prompt always leads.
pub fn openai_request(request: &StreamRequest<'_>, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(ChatMessage::new("system", request.system_prompt));
    all.extend(messages);

    let tools = request.tools.openai.clone();
    let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());

    ChatCompletionRequest {
        model: request.capability.model_name.clone(),
        messages: all,
        max_completion_tokens: Some(request.max_output_tokens),
        stream: true,
        stream_options: StreamOptions {
            include_usage: true,
        },
        tools,
        tool_choice,
        reasoning_effort: request
            .thinking
            .then(|| request.options.openai_reasoning_effort.clone()),
        enable_context_caching: request
            .options
            .context_caching(request.base_url())
            .then_some(true),
    }
}

/// Build the Gemini `streamGenerateContent` request body.
pub fn gemini_request(request: &StreamRequest<'_>, contents: Vec<Content>) -> GenerateContentRequest {
    let tools = if request.tools.gemini.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: request.tools.gemini.clone(),
        }]
    };

    GenerateContentRequest {
        contents,
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(request.system_prompt.to_string()),
                ..Part::default()
            }],
        },
        generation_config: GenerationConfig {
            max_output_tokens: request.max_output_tokens,
            temperature: request.options.gemini_temperature,
            thinking_config: request.thinking.then(|| GeminiThinking {
                thinking_budget: request.options.gemini_budget_tokens,
                include_thoughts: true,
            }),
        },
        tools,
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    type Input = Vec<Message>;

    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    fn translate(&self, turns: &[Turn], capability: &ModelCapability) -> Result<Self::Input> {
        anthropic_messages(turns, capability.thinking)
    }

    async fn stream(
        &self,
        client: &reqwest::Client,
        request: &StreamRequest<'_>,
        input: Self::Input,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let body = anthropic_request(request, input);
        let url = format!("{}/v1/messages", request.base_url());

        let builder = client
            .post(&url)
            .header("x-api-key", request.credentials.api_key.expose_secret())
            .header("anthropic-version", &request.options.anthropic_version)
            .json(&body);

        let response = open_stream(builder, self.vendor(), &url, request).await?;
        drive_stream(response, AnthropicDecoder::new(), sink).await
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    type Input = Vec<ChatMessage>;

    fn vendor(&self) -> Vendor {
        Vendor::OpenAi
    }

    fn translate(&self, turns: &[Turn], _capability: &ModelCapability) -> Result<Self::Input> {
        openai_messages(turns)
    }

    async fn stream(
        &self,
        client: &reqwest::Client,
        request: &StreamRequest<'_>,
        input: Self::Input,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let body = openai_request(request, input);
        let url = format!("{}/chat/completions", request.base_url());

        let builder = client
            .post(&url)
            .bearer_auth(request.credentials.api_key.expose_secret())
            .json(&body);

        let response = open_stream(builder, self.vendor(), &url, request).await?;
        drive_stream(response, OpenAiDecoder::new(), sink).await
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    type Input = Vec<Content>;

    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    fn translate(&self, turns: &[Turn], _capability: &ModelCapability) -> Result<Self::Input> {
        gemini_contents(turns)
    }

    async fn stream(
        &self,
        client: &reqwest::Client,
        request: &StreamRequest<'_>,
        input: Self::Input,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let body = gemini_request(request, input);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            request.base_url(),
            request.capability.model_name
        );

        let builder = client
            .post(&url)
            .header("x-goog-api-key", request.credentials.api_key.expose_secret())
            .json(&body);

        let response = open_stream(builder, self.vendor(), &url, request).await?;
        drive_stream(response, GeminiDecoder::new(), sink).await
    }
}

/// Send the request and reject any non-2xx answer with the vendor's message.
async fn open_stream(
    builder: reqwest::RequestBuilder,
    vendor: Vendor,
    url: &str,
    request: &StreamRequest<'_>,
) -> Result<reqwest::Response> {
    request.logger.log(
        LogEntry::new(
            LogLevel::Info,
            "proxy",
            format!("POST {} model={}", url, request.capability.model_name),
        )
        .for_request(request.request_id, Some(vendor)),
    );

    let response = builder
        .send()
        .await
        .map_err(|e| RelayError::stream(format!("{vendor} request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = vendor_error_message(&body).unwrap_or_else(|| truncate(&body, 500).to_string());

    request.logger.log(
        LogEntry::new(
            LogLevel::Warn,
            "proxy",
            format!("{vendor} returned status {}: {}", status.as_u16(), detail),
        )
        .for_request(request.request_id, Some(vendor)),
    );

    Err(RelayError::stream(format!(
        "{vendor} returned status {}: {}",
        status.as_u16(),
        detail
    )))
}

/// All three vendors nest a human-readable message at `error.message`.
fn vendor_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Feed SSE `data` payloads through `decoder` until the body ends or the
/// vendor signals completion, then emit the final event.
async fn drive_stream<D>(response: reqwest::Response, mut decoder: D, sink: &mut dyn EventSink) -> Result<()>
where
    D: StreamDecoder + Send,
{
    let mut events = Box::pin(response.bytes_stream().eventsource());

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| RelayError::stream(format!("SSE read failed: {e}")))?;
        let data = event.data.trim();
        if data.is_empty() {
            continue;
        }

        for output in decoder.decode(data)? {
            sink.emit(output);
        }

        if decoder.is_done() {
            break;
        }
    }

    sink.emit(decoder.finish()?);
    Ok(())
}
