use crate::error::{LlmError, Result};
use crate::providers::{ProviderPreset, Vendor};
use crate::translate::types::GenerateOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default model for generations that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub params: ParamsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Falls back to the preset's variable, then `API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Wire format override; see [`Vendor::from_name`] for accepted names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_timeout_secs() -> u64 {
    300
}

const FALLBACK_API_KEY_ENV: &str = "API_KEY";

impl ClientConfig {
    /// A config for a preset provider with no file behind it.
    pub fn for_provider(name: impl Into<String>) -> Self {
        Self {
            model: None,
            timeout_secs: default_timeout_secs(),
            provider: ProviderConfig {
                name: name.into(),
                base_url: None,
                api_key_env: None,
                format: None,
            },
            params: ParamsConfig::default(),
        }
    }

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LlmError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: explicit path > CWD > platform config dir > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        if let Some(found) = find_config_file() {
            tracing::info!(path = %found.display(), "Loading config");
            return Self::load(&found);
        }

        Err(LlmError::config(format!(
            "No config file found. Searched: {}",
            config_search_paths()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Load the config file that was found, or start from the preset for
    /// `provider` when there is none. A found file that fails to load is an
    /// error, not a reason to fall back.
    pub fn load_or_preset(found: Option<&Path>, provider: &str) -> Result<Self> {
        match found {
            Some(path) => Self::load(path),
            None => Ok(Self::for_provider(provider)),
        }
    }

    fn preset(&self) -> Option<&'static ProviderPreset> {
        ProviderPreset::from_name(&self.provider.name)
    }

    /// Resolve the effective base URL (config override or provider preset default)
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.provider.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let preset = self.preset().ok_or_else(|| {
            LlmError::config(format!(
                "Unknown provider '{}' and no base_url configured. Known providers: {}",
                self.provider.name,
                ProviderPreset::all()
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        Ok(preset.base_url.to_string())
    }

    /// Name of the environment variable holding the API key.
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        self.provider
            .api_key_env
            .as_deref()
            .or_else(|| self.preset().map(|p| p.default_api_key_env))
            .unwrap_or(FALLBACK_API_KEY_ENV)
    }

    /// Resolve the API key from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        let var = self.api_key_env();
        std::env::var(var).map_err(|_| {
            LlmError::config(format!(
                "Environment variable '{var}' not set. Set it with your provider API key."
            ))
        })
    }

    /// Wire format: explicit `format`, else the preset's, else OpenAI Chat.
    pub fn vendor(&self) -> Result<Vendor> {
        if let Some(ref format) = self.provider.format {
            return Vendor::from_name(format)
                .ok_or_else(|| LlmError::config(format!("Unknown provider format '{format}'")));
        }
        Ok(self.preset().map_or(Vendor::OpenAiChat, |p| p.vendor))
    }

    /// Options seeded from `model` and `[params]`.
    pub fn generate_options(&self) -> Result<GenerateOptions> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| LlmError::config("No model configured"))?;
        Ok(GenerateOptions {
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            ..GenerateOptions::new(model)
        })
    }
}

/// Locations [`ClientConfig::find_and_load`] checks, in order.
/// The first config file that exists on the search path.
pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|p| p.exists())
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("llm-bridge.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("llm-bridge")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("llm-bridge").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("llm-bridge").join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = home_dir() {
        paths.push(home.join(".llm-bridge.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
model = "claude-sonnet-4-20250514"
timeout_secs = 60

[provider]
name = "anthropic"

[params]
max_tokens = 1024
temperature = 0.2
"#
        )
        .unwrap();

        let config = ClientConfig::load(f.path()).unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.provider.name, "anthropic");
        assert_eq!(config.vendor().unwrap(), Vendor::Anthropic);
        assert_eq!(config.api_key_env(), "ANTHROPIC_API_KEY");

        let options = config.generate_options().unwrap();
        assert_eq!(options.model, "claude-sonnet-4-20250514");
        assert_eq!(options.max_tokens, Some(1024));
        assert_eq!(options.temperature, Some(0.2));
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[provider]\nname = \"openai\"").unwrap();

        let config = ClientConfig::load(f.path()).unwrap();
        assert_eq!(config.timeout_secs, 300);
        assert!(config.model.is_none());
        assert!(config.generate_options().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "provider = [").unwrap();
        assert!(matches!(
            ClientConfig::load(f.path()),
            Err(LlmError::Toml(_))
        ));
    }

    #[test]
    fn test_preset_only_when_no_file_was_found() {
        let config = ClientConfig::load_or_preset(None, "groq").unwrap();
        assert_eq!(config.provider.name, "groq");

        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "provider = [").unwrap();
        assert!(matches!(
            ClientConfig::load_or_preset(Some(f.path()), "groq"),
            Err(LlmError::Toml(_))
        ));
    }

    #[test]
    fn test_explicit_missing_path_is_config_error() {
        let err = ClientConfig::find_and_load(Some(Path::new("/nonexistent/llm-bridge.toml")))
            .unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_effective_base_url_from_preset() {
        let config = ClientConfig::for_provider("openai");
        assert_eq!(
            config.effective_base_url().unwrap(),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn test_effective_base_url_override() {
        let mut config = ClientConfig::for_provider("custom");
        config.provider.base_url = Some("https://my-server.com/v1/".to_string());
        assert_eq!(
            config.effective_base_url().unwrap(),
            "https://my-server.com/v1"
        );
    }

    #[test]
    fn test_unknown_provider_without_base_url() {
        let config = ClientConfig::for_provider("nowhere");
        let err = config.effective_base_url().unwrap_err();
        assert!(err.to_string().contains("Unknown provider 'nowhere'"));
        assert_eq!(config.api_key_env(), "API_KEY");
    }

    #[test]
    fn test_vendor_resolution() {
        // unknown provider with a base_url speaks OpenAI Chat
        let mut config = ClientConfig::for_provider("local");
        assert_eq!(config.vendor().unwrap(), Vendor::OpenAiChat);

        config.provider.format = Some("gemini".to_string());
        assert_eq!(config.vendor().unwrap(), Vendor::Google);

        config.provider.format = Some("soap".to_string());
        assert!(config.vendor().is_err());

        assert_eq!(
            ClientConfig::for_provider("openai-responses").vendor().unwrap(),
            Vendor::OpenAiResponses
        );
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        let mut config = ClientConfig::for_provider("openai");
        config.provider.api_key_env = Some("LLM_BRIDGE_TEST_KEY_7F3A".to_string());
        assert!(config.resolve_api_key().is_err());

        std::env::set_var("LLM_BRIDGE_TEST_KEY_7F3A", "sk-test");
        assert_eq!(config.resolve_api_key().unwrap(), "sk-test");
        std::env::remove_var("LLM_BRIDGE_TEST_KEY_7F3A");
    }

    #[test]
    fn test_search_paths_start_in_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("llm-bridge.toml"));
    }
}
