use crate::error::{RelayError, Result};
use crate::prompt::PromptLibrary;
use crate::registry::{ModelCapability, ModelRegistry};
use crate::tools::ToolCatalog;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub vendors: VendorOptions,
    #[serde(default)]
    pub prompts: PromptLibrary,
    /// JSON tool catalog; the built-in `get_weather` catalog when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_file: Option<PathBuf>,
    /// Extra capability records, e.g. third-party hosts of a vendor protocol.
    #[serde(default)]
    pub models: Vec<ModelCapability>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth: AuthConfig::default(),
            vendors: VendorOptions::default(),
            prompts: PromptLibrary::default(),
            tools_file: None,
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret_env: default_jwt_secret_env(),
            token_prefix: default_token_prefix(),
        }
    }
}

/// Knobs applied to vendor requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorOptions {
    #[serde(default = "default_anthropic_budget")]
    pub anthropic_budget_tokens: u64,
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
    #[serde(default = "default_gemini_budget")]
    pub gemini_budget_tokens: u64,
    #[serde(default = "default_gemini_temperature")]
    pub gemini_temperature: f64,
    #[serde(default = "default_reasoning_effort")]
    pub openai_reasoning_effort: String,
    /// OpenAI-compatible base URLs that accept `enable_context_caching`.
    #[serde(default = "default_context_caching_hosts")]
    pub context_caching_hosts: Vec<String>,
}

impl Default for VendorOptions {
    fn default() -> Self {
        Self {
            anthropic_budget_tokens: default_anthropic_budget(),
            anthropic_version: default_anthropic_version(),
            gemini_budget_tokens: default_gemini_budget(),
            gemini_temperature: default_gemini_temperature(),
            openai_reasoning_effort: default_reasoning_effort(),
            context_caching_hosts: default_context_caching_hosts(),
        }
    }
}

impl VendorOptions {
    pub fn context_caching(&self, base_url: &str) -> bool {
        let base_url = base_url.trim_end_matches('/');
        self.context_caching_hosts
            .iter()
            .any(|h| h.trim_end_matches('/') == base_url)
    }
}

fn default_port() -> u16 {
    4000
}

fn default_true() -> bool {
    true
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_token_prefix() -> String {
    "vibe_".to_string()
}

fn default_anthropic_budget() -> u64 {
    1025
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_gemini_budget() -> u64 {
    1000
}

fn default_gemini_temperature() -> f64 {
    0.7
}

fn default_reasoning_effort() -> String {
    "medium".to_string()
}

fn default_context_caching_hosts() -> Vec<String> {
    vec!["https://api.moonshot.ai/v1".to_string()]
}

impl RelayConfig {
    /// Load config from a TOML file. Missing sections take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir. With no file anywhere
    /// the defaults are used.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::with_extra(self.models.iter().cloned())
    }

    /// Tool catalog from `tools_file`, or the built-in one.
    pub fn tool_catalog(&self) -> Result<ToolCatalog> {
        match &self.tools_file {
            Some(path) => ToolCatalog::load(path),
            None => Ok(ToolCatalog::builtin()),
        }
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("chat-relay.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("chat-relay")
                    .join("config.toml"),
            );
        }
    } else if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("chat-relay").join("config.toml"));
    } else if let Some(home) = dirs_path() {
        paths.push(home.join(".config").join("chat-relay").join("config.toml"));
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".chat-relay.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::Vendor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[auth]
enabled = false

[vendors]
gemini_temperature = 0.2

[prompts]
full = "be helpful"

[[models]]
modelName = "kimi-k2-0711-preview"
provider = "moonshot"
displayName = "Kimi K2"
vendor = "openai"
maxInputTokens = 128000
maxOutputTokens = 16000
baseUrl = "https://api.moonshot.ai/v1"
"#
        )
        .unwrap();

        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.token_prefix, "vibe_");
        assert_eq!(config.vendors.gemini_temperature, 0.2);
        assert_eq!(config.vendors.anthropic_budget_tokens, 1025);
        assert_eq!(config.prompts.full, "be helpful");
        assert!(config.prompts.lite.contains("{add_ons}"));

        let registry = config.registry();
        let kimi = registry
            .lookup(Vendor::OpenAi, "kimi-k2-0711-preview", Some("moonshot"))
            .unwrap();
        assert!(!kimi.thinking);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 4000);
        assert!(config.auth.enabled);
        assert_eq!(config.vendors, VendorOptions::default());
        assert_eq!(config.tool_catalog().unwrap(), ToolCatalog::builtin());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "port = \"not a number\"").unwrap();
        assert!(RelayConfig::load(f.path()).is_err());
    }

    #[test]
    fn test_context_caching_hosts() {
        let options = VendorOptions::default();
        assert!(options.context_caching("https://api.moonshot.ai/v1"));
        assert!(options.context_caching("https://api.moonshot.ai/v1/"));
        assert!(!options.context_caching("https://api.openai.com/v1"));
    }

    #[test]
    fn test_search_paths_start_in_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("chat-relay.toml"));
    }
}
