//! Built-in provider presets and the vendor wire formats they speak.
//!
//! Each preset defines the base URL, wire format, and default environment
//! variable for the API key, so a config only needs a provider name.

use serde::{Deserialize, Serialize};

/// The streaming wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    OpenAiChat,
    OpenAiResponses,
    Anthropic,
    Google,
}

impl Vendor {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OpenAiChat => "openai_chat",
            Vendor::OpenAiResponses => "openai_responses",
            Vendor::Anthropic => "anthropic",
            Vendor::Google => "google",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Vendor> {
        match name.to_ascii_lowercase().as_str() {
            "openai_chat" | "openai" | "chat" => Some(Vendor::OpenAiChat),
            "openai_responses" | "responses" => Some(Vendor::OpenAiResponses),
            "anthropic" => Some(Vendor::Anthropic),
            "google" | "gemini" => Some(Vendor::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub vendor: Vendor,
    pub default_api_key_env: &'static str,
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        vendor: Vendor::OpenAiChat,
        default_api_key_env: "OPENAI_API_KEY",
    },
    ProviderPreset {
        name: "openai-responses",
        base_url: "https://api.openai.com/v1",
        vendor: Vendor::OpenAiResponses,
        default_api_key_env: "OPENAI_API_KEY",
    },
    ProviderPreset {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        vendor: Vendor::OpenAiChat,
        default_api_key_env: "OPENROUTER_API_KEY",
    },
    ProviderPreset {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        vendor: Vendor::OpenAiChat,
        default_api_key_env: "GROQ_API_KEY",
    },
    ProviderPreset {
        name: "together",
        base_url: "https://api.together.xyz/v1",
        vendor: Vendor::OpenAiChat,
        default_api_key_env: "TOGETHER_API_KEY",
    },
    ProviderPreset {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        vendor: Vendor::OpenAiChat,
        default_api_key_env: "DEEPSEEK_API_KEY",
    },
    ProviderPreset {
        name: "anthropic",
        base_url: "https://api.anthropic.com",
        vendor: Vendor::Anthropic,
        default_api_key_env: "ANTHROPIC_API_KEY",
    },
    ProviderPreset {
        name: "google",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        vendor: Vendor::Google,
        default_api_key_env: "GEMINI_API_KEY",
    },
];

impl ProviderPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ProviderPreset> {
        let name = name.to_lowercase();
        let name = if name == "gemini" { "google" } else { name.as_str() };
        PRESETS.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn all() -> &'static [ProviderPreset] {
        PRESETS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        assert!(ProviderPreset::from_name("openai").is_some());
        assert!(ProviderPreset::from_name("OpenRouter").is_some()); // case-insensitive
        assert!(ProviderPreset::from_name("unknown_provider").is_none());
    }

    #[test]
    fn test_gemini_alias_resolves_to_google() {
        let preset = ProviderPreset::from_name("Gemini").unwrap();
        assert_eq!(preset.name, "google");
        assert_eq!(preset.vendor, Vendor::Google);
    }

    #[test]
    fn test_vendor_names_round_trip() {
        for vendor in [
            Vendor::OpenAiChat,
            Vendor::OpenAiResponses,
            Vendor::Anthropic,
            Vendor::Google,
        ] {
            assert_eq!(Vendor::from_name(vendor.as_str()), Some(vendor));
        }
        assert_eq!(Vendor::from_name("gemini"), Some(Vendor::Google));
        assert_eq!(Vendor::from_name("cohere"), None);
    }

    #[test]
    fn test_only_anthropic_and_google_use_their_own_formats() {
        for preset in ProviderPreset::all() {
            match preset.name {
                "anthropic" => assert_eq!(preset.vendor, Vendor::Anthropic),
                "google" => assert_eq!(preset.vendor, Vendor::Google),
                "openai-responses" => assert_eq!(preset.vendor, Vendor::OpenAiResponses),
                other => assert_eq!(
                    preset.vendor,
                    Vendor::OpenAiChat,
                    "Provider {other} should be openai_chat format"
                ),
            }
        }
    }
}
