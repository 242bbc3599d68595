//! Model capability registry.
//!
//! A capability record says how far a model can be pushed (context window,
//! output budget, extended thinking) and, for third-party hosts speaking a
//! vendor's protocol, where to reach it. Built-in records cover each vendor's
//! own models; configuration may add more.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::vendor::Vendor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapability {
    pub model_name: String,
    pub provider: String,
    pub display_name: String,
    #[serde(alias = "sdk")]
    pub vendor: Vendor,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    #[serde(default)]
    pub thinking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_thinking_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_thinking_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

struct BuiltinModel {
    model_name: &'static str,
    provider: &'static str,
    display_name: &'static str,
    vendor: Vendor,
    max_input_tokens: u64,
    max_output_tokens: u64,
    /// `(min, max)` thinking budget for models with extended thinking.
    thinking: Option<(u64, u64)>,
}

const BUILTIN: &[BuiltinModel] = &[
    // Anthropic
    BuiltinModel {
        model_name: "claude-opus-4-20250514",
        provider: "anthropic",
        display_name: "Claude Opus 4",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 32_000,
        thinking: Some((1024, 32_000)),
    },
    BuiltinModel {
        model_name: "claude-sonnet-4-20250514",
        provider: "anthropic",
        display_name: "Claude Sonnet 4",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 64_000,
        thinking: Some((1024, 64_000)),
    },
    BuiltinModel {
        model_name: "claude-3-7-sonnet-20250219",
        provider: "anthropic",
        display_name: "Claude Sonnet 3.7",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 64_000,
        thinking: Some((1024, 64_000)),
    },
    BuiltinModel {
        model_name: "claude-3-5-sonnet-20241022",
        provider: "anthropic",
        display_name: "Claude Sonnet 3.5 (New)",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 8192,
        thinking: None,
    },
    BuiltinModel {
        model_name: "claude-3-5-haiku-20241022",
        provider: "anthropic",
        display_name: "Claude Haiku 3.5",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 8192,
        thinking: None,
    },
    BuiltinModel {
        model_name: "claude-3-haiku-20240307",
        provider: "anthropic",
        display_name: "Claude Haiku 3",
        vendor: Vendor::Anthropic,
        max_input_tokens: 200_000,
        max_output_tokens: 4096,
        thinking: None,
    },
    // OpenAI
    BuiltinModel {
        model_name: "o4-mini",
        provider: "openai",
        display_name: "OpenAI o4-mini",
        vendor: Vendor::OpenAi,
        max_input_tokens: 200_000,
        max_output_tokens: 100_000,
        thinking: Some((1024, 32_000)),
    },
    BuiltinModel {
        model_name: "o3",
        provider: "openai",
        display_name: "OpenAI o3",
        vendor: Vendor::OpenAi,
        max_input_tokens: 200_000,
        max_output_tokens: 100_000,
        thinking: Some((1024, 32_000)),
    },
    BuiltinModel {
        model_name: "o3-mini",
        provider: "openai",
        display_name: "OpenAI o3-mini",
        vendor: Vendor::OpenAi,
        max_input_tokens: 200_000,
        max_output_tokens: 100_000,
        thinking: Some((1024, 16_000)),
    },
    BuiltinModel {
        model_name: "gpt-4o",
        provider: "openai",
        display_name: "GPT-4o",
        vendor: Vendor::OpenAi,
        max_input_tokens: 128_000,
        max_output_tokens: 16_384,
        thinking: None,
    },
    BuiltinModel {
        model_name: "gpt-4.1",
        provider: "openai",
        display_name: "GPT-4.1",
        vendor: Vendor::OpenAi,
        max_input_tokens: 1_047_576,
        max_output_tokens: 32_768,
        thinking: None,
    },
    // Gemini
    BuiltinModel {
        model_name: "gemini-2.5-pro",
        provider: "google",
        display_name: "Gemini 2.5 Pro",
        vendor: Vendor::Gemini,
        max_input_tokens: 1_048_576,
        max_output_tokens: 65_536,
        thinking: Some((128, 32_768)),
    },
    BuiltinModel {
        model_name: "gemini-2.5-flash",
        provider: "google",
        display_name: "Gemini 2.5 Flash",
        vendor: Vendor::Gemini,
        max_input_tokens: 1_048_576,
        max_output_tokens: 65_536,
        thinking: Some((0, 24_576)),
    },
    BuiltinModel {
        model_name: "gemini-2.0-flash",
        provider: "google",
        display_name: "Gemini 2.0 Flash",
        vendor: Vendor::Gemini,
        max_input_tokens: 1_048_576,
        max_output_tokens: 8192,
        thinking: None,
    },
];

impl From<&BuiltinModel> for ModelCapability {
    fn from(m: &BuiltinModel) -> Self {
        Self {
            model_name: m.model_name.to_string(),
            provider: m.provider.to_string(),
            display_name: m.display_name.to_string(),
            vendor: m.vendor,
            max_input_tokens: m.max_input_tokens,
            max_output_tokens: m.max_output_tokens,
            thinking: m.thinking.is_some(),
            min_thinking_tokens: m.thinking.map(|(min, _)| min),
            max_thinking_tokens: m.thinking.map(|(_, max)| max),
            base_url: None,
        }
    }
}

/// Records grouped the way the models endpoint reports them. Models served
/// by a provider other than the vendor's own land in `other`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelListing {
    pub anthropic: Vec<ModelCapability>,
    pub openai: Vec<ModelCapability>,
    pub gemini: Vec<ModelCapability>,
    pub other: Vec<ModelCapability>,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelCapability>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN.iter().map(ModelCapability::from).collect(),
        }
    }

    /// Built-in records plus `extra`. An extra record replaces a built-in one
    /// with the same vendor, provider and model name.
    pub fn with_extra(extra: impl IntoIterator<Item = ModelCapability>) -> Self {
        let mut registry = Self::builtin();
        for record in extra {
            registry.models.retain(|m| {
                !(m.vendor == record.vendor
                    && m.provider == record.provider
                    && m.model_name == record.model_name)
            });
            registry.models.push(record);
        }
        registry
    }

    /// Find the record for `model` served by `provider` over `vendor`'s
    /// protocol. Without a provider the vendor's own is assumed.
    pub fn lookup(&self, vendor: Vendor, model: &str, provider: Option<&str>) -> Result<&ModelCapability> {
        let provider = provider
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vendor.native_provider());

        self.models
            .iter()
            .find(|m| m.vendor == vendor && m.provider == provider && m.model_name == model)
            .ok_or_else(|| {
                RelayError::model_not_found(format!(
                    "no {vendor} model '{model}' for provider '{provider}'"
                ))
            })
    }

    pub fn list(&self) -> ModelListing {
        let mut listing = ModelListing::default();
        for model in &self.models {
            let bucket = if model.provider != model.vendor.native_provider() {
                &mut listing.other
            } else {
                match model.vendor {
                    Vendor::Anthropic => &mut listing.anthropic,
                    Vendor::OpenAi => &mut listing.openai,
                    Vendor::Gemini => &mut listing.gemini,
                }
            };
            bucket.push(model.clone());
        }
        listing
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moonshot() -> ModelCapability {
        ModelCapability {
            model_name: "kimi-k2-0711-preview".to_string(),
            provider: "moonshot".to_string(),
            display_name: "Kimi K2".to_string(),
            vendor: Vendor::OpenAi,
            max_input_tokens: 128_000,
            max_output_tokens: 16_000,
            thinking: false,
            min_thinking_tokens: None,
            max_thinking_tokens: None,
            base_url: Some("https://api.moonshot.ai/v1".to_string()),
        }
    }

    #[test]
    fn test_lookup_defaults_to_native_provider() {
        let registry = ModelRegistry::builtin();
        let model = registry
            .lookup(Vendor::Anthropic, "claude-sonnet-4-20250514", None)
            .unwrap();
        assert!(model.thinking);
        assert_eq!(model.provider, "anthropic");

        assert!(registry.lookup(Vendor::Gemini, "gemini-2.5-pro", Some("google")).is_ok());
    }

    #[test]
    fn test_lookup_requires_matching_vendor() {
        let registry = ModelRegistry::builtin();
        let err = registry
            .lookup(Vendor::OpenAi, "claude-sonnet-4-20250514", None)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ModelNotFound);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::builtin();
        assert!(registry
            .lookup(Vendor::Anthropic, "nonexistent-model", None)
            .is_err());
    }

    #[test]
    fn test_extra_models_are_listed_as_other() {
        let registry = ModelRegistry::with_extra(vec![moonshot()]);

        let found = registry
            .lookup(Vendor::OpenAi, "kimi-k2-0711-preview", Some("moonshot"))
            .unwrap();
        assert_eq!(found.base_url.as_deref(), Some("https://api.moonshot.ai/v1"));

        let listing = registry.list();
        assert_eq!(listing.other.len(), 1);
        assert!(listing.anthropic.iter().all(|m| m.vendor == Vendor::Anthropic));
        assert_eq!(
            listing.anthropic.len() + listing.openai.len() + listing.gemini.len() + listing.other.len(),
            registry.len()
        );
    }

    #[test]
    fn test_extra_record_overrides_builtin() {
        let mut override_record = ModelCapability::from(&BUILTIN[0]);
        override_record.max_output_tokens = 1000;
        let registry = ModelRegistry::with_extra(vec![override_record]);

        assert_eq!(registry.len(), BUILTIN.len());
        let model = registry
            .lookup(Vendor::Anthropic, BUILTIN[0].model_name, None)
            .unwrap();
        assert_eq!(model.max_output_tokens, 1000);
    }

    #[test]
    fn test_thinking_models_have_budgets() {
        for model in ModelRegistry::builtin().list().anthropic {
            assert_eq!(model.thinking, model.max_thinking_tokens.is_some());
        }
    }

    #[test]
    fn test_capability_serializes_camel_case() {
        let value = serde_json::to_value(moonshot()).unwrap();
        assert_eq!(value["modelName"], "kimi-k2-0711-preview");
        assert_eq!(value["vendor"], "openai");
        assert_eq!(value["baseUrl"], "https://api.moonshot.ai/v1");
    }
}
