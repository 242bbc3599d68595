//! Vendor selection and the per-vendor backend interface.
//!
//! Each vendor pairs a translator (canonical turns → vendor input) with a
//! stream adapter (vendor input → canonical events). [`VendorInput`] ties the
//! two together: it can only be built by a vendor's translator and only be
//! consumed by the same vendor's adapter.

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::VendorOptions;
use crate::error::{RelayError, Result};
use crate::logging::SharedLogger;
use crate::proxy::{AnthropicBackend, GeminiBackend, OpenAiBackend};
use crate::registry::ModelCapability;
use crate::tools::ToolCatalog;
use crate::translate::anthropic_types::Message;
use crate::translate::canonical::Turn;
use crate::translate::event::EventSink;
use crate::translate::gemini_types::Content;
use crate::translate::openai_types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::Anthropic, Vendor::OpenAi, Vendor::Gemini];

    /// Parse the `sdk` field of a chat request.
    pub fn from_sdk(sdk: &str) -> Result<Self> {
        match sdk.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(RelayError::UnsupportedVendor(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Provider name of the vendor's own hosted models.
    pub fn native_provider(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "google",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Run this vendor's translator over `turns`.
    pub fn translate(self, turns: &[Turn], capability: &ModelCapability) -> Result<VendorInput> {
        match self {
            Self::Anthropic => AnthropicBackend
                .translate(turns, capability)
                .map(VendorInput::Anthropic),
            Self::OpenAi => OpenAiBackend
                .translate(turns, capability)
                .map(VendorInput::OpenAi),
            Self::Gemini => GeminiBackend
                .translate(turns, capability)
                .map(VendorInput::Gemini),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request credentials. Never read from process-wide state.
#[derive(Debug)]
pub struct VendorCredentials {
    pub api_key: SecretString,
    pub base_url: Option<String>,
}

impl VendorCredentials {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

/// Everything an adapter needs besides the translated conversation.
#[derive(Clone, Copy)]
pub struct StreamRequest<'a> {
    pub request_id: &'a str,
    pub capability: &'a ModelCapability,
    pub credentials: &'a VendorCredentials,
    pub system_prompt: &'a str,
    pub tools: &'a ToolCatalog,
    pub max_output_tokens: u64,
    pub thinking: bool,
    pub options: &'a VendorOptions,
    pub logger: &'a SharedLogger,
}

impl StreamRequest<'_> {
    /// Base URL for the vendor call: the model record's, else the caller's,
    /// else the vendor default. Trailing slashes are dropped.
    pub fn base_url(&self) -> &str {
        self.capability
            .base_url
            .as_deref()
            .or(self.credentials.base_url.as_deref())
            .unwrap_or_else(|| self.capability.vendor.default_base_url())
            .trim_end_matches('/')
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    type Input: Send;

    fn vendor(&self) -> Vendor;

    fn translate(&self, turns: &[Turn], capability: &ModelCapability) -> Result<Self::Input>;

    /// Open the vendor stream and feed every decoded event to `sink`, ending
    /// with exactly one `final`. On error nothing more is emitted.
    async fn stream(
        &self,
        client: &reqwest::Client,
        request: &StreamRequest<'_>,
        input: Self::Input,
        sink: &mut dyn EventSink,
    ) -> Result<()>;
}

/// Translated conversation, tagged with the vendor whose adapter consumes it.
#[derive(Debug, Clone)]
pub enum VendorInput {
    Anthropic(Vec<Message>),
    OpenAi(Vec<ChatMessage>),
    Gemini(Vec<Content>),
}

impl VendorInput {
    pub fn vendor(&self) -> Vendor {
        match self {
            Self::Anthropic(_) => Vendor::Anthropic,
            Self::OpenAi(_) => Vendor::OpenAi,
            Self::Gemini(_) => Vendor::Gemini,
        }
    }

    /// Number of vendor messages.
    pub fn len(&self) -> usize {
        match self {
            Self::Anthropic(m) => m.len(),
            Self::OpenAi(m) => m.len(),
            Self::Gemini(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn stream(
        self,
        client: &reqwest::Client,
        request: &StreamRequest<'_>,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        match self {
            Self::Anthropic(input) => AnthropicBackend.stream(client, request, input, sink).await,
            Self::OpenAi(input) => OpenAiBackend.stream(client, request, input, sink).await,
            Self::Gemini(input) => GeminiBackend.stream(client, request, input, sink).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;

    #[test]
    fn test_from_sdk() {
        assert_eq!(Vendor::from_sdk("anthropic").unwrap(), Vendor::Anthropic);
        assert_eq!(Vendor::from_sdk("OpenAI").unwrap(), Vendor::OpenAi);
        assert_eq!(Vendor::from_sdk("gemini").unwrap(), Vendor::Gemini);

        let err = Vendor::from_sdk("other").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ProviderNotSupported);
    }

    #[test]
    fn test_serde_names_match_sdk_names() {
        for vendor in Vendor::ALL {
            let json = serde_json::to_value(vendor).unwrap();
            assert_eq!(json, vendor.as_str());
            assert_eq!(Vendor::from_sdk(vendor.as_str()).unwrap(), vendor);
        }
    }

    #[test]
    fn test_translate_tags_input_with_vendor() {
        let registry = ModelRegistry::builtin();
        let turns = vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("bye")];

        for vendor in Vendor::ALL {
            let capability = registry.list();
            let capability = match vendor {
                Vendor::Anthropic => &capability.anthropic[0],
                Vendor::OpenAi => &capability.openai[0],
                Vendor::Gemini => &capability.gemini[0],
            };
            let input = vendor.translate(&turns, capability).unwrap();
            assert_eq!(input.vendor(), vendor);
            assert_eq!(input.len(), 3);
        }
    }

    #[test]
    fn test_credentials_ignore_blank_base_url() {
        let creds = VendorCredentials::new("sk-test", Some("  ".to_string()));
        assert!(creds.base_url.is_none());
    }
}
