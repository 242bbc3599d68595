use crate::auth::AuthGate;
use crate::config::RelayConfig;
use crate::error::{ErrorCode, RelayError, Result};
use crate::logging::{LogEntry, LogLevel, SharedLogger};
use crate::prompt::Plan;
use crate::registry::{ModelCapability, ModelRegistry};
use crate::tools::ToolCatalog;
use crate::translate::canonical::Turn;
use crate::translate::event::OutputEvent;
use crate::vendor::{StreamRequest, Vendor, VendorCredentials, VendorInput};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const DONE_LINE: &str = "{\"type\":\"done\"}\n";

pub struct AppState {
    pub config: RelayConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
    pub registry: ModelRegistry,
    pub tools: ToolCatalog,
    pub auth: AuthGate,
}

impl AppState {
    /// State with the registry and tool catalog taken from `config`.
    pub fn new(config: RelayConfig, client: reqwest::Client, logger: SharedLogger, auth: AuthGate) -> Result<Self> {
        let registry = config.registry();
        let tools = config.tool_catalog()?;
        Ok(Self {
            config,
            client,
            logger,
            registry,
            tools,
            auth,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat/stream", post(handle_chat_stream))
        .route("/models", get(handle_models))
        .route("/models/available", get(handle_models))
        .route("/user", get(handle_user))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    chat: ChatRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    messages: Vec<Turn>,
    sdk: String,
    #[serde(default)]
    provider: Option<String>,
    model: String,
    #[serde(default, rename = "max_tokens")]
    max_tokens: Option<u64>,
    #[serde(default)]
    thinking: Option<bool>,
    #[serde(default)]
    plan: Plan,
    api_key: String,
    #[serde(default, rename = "base_url")]
    base_url: Option<String>,
}

impl ChatRequest {
    fn max_output_tokens(&self, capability: &ModelCapability) -> u64 {
        self.max_tokens
            .map_or(capability.max_output_tokens, |m| m.min(capability.max_output_tokens))
    }

    fn thinking(&self, capability: &ModelCapability) -> bool {
        capability.thinking && self.thinking != Some(false)
    }
}

/// A request that passed every pre-stream check.
struct PreparedChat {
    vendor: Vendor,
    capability: ModelCapability,
    input: VendorInput,
}

fn prepare(state: &AppState, chat: &ChatRequest) -> Result<PreparedChat> {
    let vendor = Vendor::from_sdk(&chat.sdk)?;
    let capability = state
        .registry
        .lookup(vendor, &chat.model, chat.provider.as_deref())?
        .clone();
    let input = vendor.translate(&chat.messages, &capability)?;
    Ok(PreparedChat {
        vendor,
        capability,
        input,
    })
}

async fn handle_chat_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let chat = match serde_json::from_slice::<ChatEnvelope>(&body) {
        Ok(envelope) => envelope.chat,
        Err(e) => {
            state.logger.log(
                LogEntry::new(LogLevel::Warn, "server", format!("Invalid chat request: {}", e))
                    .for_request(&request_id, None),
            );
            return error_json(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, e.to_string());
        }
    };

    if chat.messages.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "messages must not be empty",
        );
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let user = match state.auth.verify(authorization, Utc::now()) {
        Ok(user) => user,
        Err(e) => {
            state.logger.log(
                LogEntry::new(LogLevel::Warn, "auth", e.to_string()).for_request(&request_id, None),
            );
            return error_json(e.status(), e.code(), e.to_string());
        }
    };

    let prepared = match prepare(&state, &chat) {
        Ok(p) => p,
        Err(e) => {
            state.logger.log(
                LogEntry::new(LogLevel::Warn, "server", e.to_string()).for_request(&request_id, None),
            );
            return ndjson_response(Body::from(error_line(&e)));
        }
    };

    let max_output_tokens = chat.max_output_tokens(&prepared.capability);
    let thinking = chat.thinking(&prepared.capability);

    state.logger.log(
        LogEntry::new(
            LogLevel::Info,
            "server",
            format!(
                "Chat: model={} messages={} thinking={}",
                prepared.capability.model_name,
                prepared.input.len(),
                thinking
            ),
        )
        .for_request(&request_id, Some(prepared.vendor))
        .with_context(serde_json::json!({
            "provider": prepared.capability.provider,
            "maxOutputTokens": max_output_tokens,
            "user": user.as_ref().map(|u| u.email.as_str()),
        })),
    );

    let (tx, rx) = mpsc::unbounded_channel::<OutputEvent>();
    let system_prompt = state.config.prompts.assemble(&chat.plan);
    let credentials = VendorCredentials::new(chat.api_key, chat.base_url);
    let task_state = state.clone();
    let task_request_id = request_id.clone();
    let PreparedChat {
        vendor,
        capability,
        input,
    } = prepared;

    let task = tokio::spawn(async move {
        let state = task_state;
        let request = StreamRequest {
            request_id: &task_request_id,
            capability: &capability,
            credentials: &credentials,
            system_prompt: &system_prompt,
            tools: &state.tools,
            max_output_tokens,
            thinking,
            options: &state.config.vendors,
            logger: &state.logger,
        };
        let mut sink = tx;
        input.stream(&state.client, &request, &mut sink).await
    });

    let logger = state.logger.clone();
    let mut events = UnboundedReceiverStream::new(rx);
    let lines = async_stream::stream! {
        while let Some(event) = events.next().await {
            let line = match serde_json::to_string(&event) {
                Ok(json) => json + "\n",
                Err(e) => {
                    logger.error("server", format!("Failed to serialize event: {}", e));
                    continue;
                }
            };
            yield Ok::<Bytes, Infallible>(Bytes::from(line));

            if let OutputEvent::Final { usage_metadata, finish_reason, .. } = &event {
                logger.log(
                    LogEntry::new(
                        LogLevel::Info,
                        "server",
                        format!("Stream finished: finish_reason={}", finish_reason.as_deref().unwrap_or("none")),
                    )
                    .for_request(&request_id, Some(vendor))
                    .with_usage(*usage_metadata),
                );
                yield Ok(Bytes::from_static(DONE_LINE.as_bytes()));
            }
        }

        let failure = match task.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(RelayError::other(format!("stream task failed: {}", e))),
        };
        if let Some(e) = failure {
            logger.log(
                LogEntry::new(LogLevel::Error, "proxy", e.to_string())
                    .for_request(&request_id, Some(vendor)),
            );
            yield Ok(Bytes::from(error_line(&e)));
        }
    };

    ndjson_response(Body::from_stream(lines))
}

async fn handle_user(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.auth.verify(authorization, Utc::now()) {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => error_json(
            StatusCode::NOT_FOUND,
            ErrorCode::NoAccessToken,
            "authentication is disabled",
        ),
        Err(e) => error_json(e.status(), e.code(), e.to_string()),
    }
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "models": state.registry.list() }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.registry.len(),
        "auth": state.auth.is_enabled(),
    }))
}

fn ndjson_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

fn error_json(status: StatusCode, code: ErrorCode, details: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": code, "details": details.into() });
    (status, Json(body)).into_response()
}

/// In-stream error framing: one SSE-style `data:` record, after which the
/// body ends.
fn error_line(err: &RelayError) -> String {
    let body = serde_json::json!({ "error": err.code(), "details": err.to_string() });
    format!("data: {}\n\n", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(max_tokens: Option<u64>, thinking: Option<bool>) -> ChatRequest {
        serde_json::from_value(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "sdk": "anthropic",
            "model": "claude-sonnet-4-20250514",
            "max_tokens": max_tokens,
            "thinking": thinking,
            "plan": {"mode": "full"},
            "apiKey": "sk-test",
        }))
        .unwrap()
    }

    fn capability(thinking: bool) -> ModelCapability {
        let mut cap = ModelRegistry::builtin()
            .lookup(Vendor::Anthropic, "claude-sonnet-4-20250514", None)
            .unwrap()
            .clone();
        cap.max_output_tokens = 8000;
        cap.thinking = thinking;
        cap
    }

    #[test]
    fn test_max_tokens_clamped_to_capability() {
        assert_eq!(chat(Some(100_000), None).max_output_tokens(&capability(true)), 8000);
        assert_eq!(chat(Some(1000), None).max_output_tokens(&capability(true)), 1000);
        assert_eq!(chat(None, None).max_output_tokens(&capability(true)), 8000);
    }

    #[test]
    fn test_thinking_needs_capability_and_no_opt_out() {
        assert!(chat(None, None).thinking(&capability(true)));
        assert!(chat(None, Some(true)).thinking(&capability(true)));
        assert!(!chat(None, Some(false)).thinking(&capability(true)));
        assert!(!chat(None, Some(true)).thinking(&capability(false)));
    }

    #[test]
    fn test_error_line_framing() {
        let line = error_line(&RelayError::model_not_found("nope"));
        assert!(line.starts_with("data: "));
        assert!(line.ends_with("\n\n"));

        let json: serde_json::Value =
            serde_json::from_str(line.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(json["error"], "model_not_found");
        assert_eq!(json["details"], "Model not found: nope");
    }

    #[test]
    fn test_plan_defaults_when_absent() {
        let chat: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [],
            "sdk": "gemini",
            "model": "gemini-2.5-pro",
            "apiKey": "k",
        }))
        .unwrap();
        assert_eq!(chat.plan, Plan::default());
        assert!(chat.base_url.is_none());
    }

    #[test]
    fn test_client_temperature_is_accepted_and_ignored() {
        let chat: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [],
            "sdk": "gemini",
            "model": "gemini-2.5-pro",
            "temperature": 0.1,
            "apiKey": "k",
        }))
        .unwrap();
        assert_eq!(chat.model, "gemini-2.5-pro");
    }
}
