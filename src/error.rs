//! Error types for the client.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LlmError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Non-2xx HTTP status returned by the vendor before any streaming began.
    #[error("API error: {status} {status_text}")]
    Api { status: u16, status_text: String },

    /// Error event delivered inside an Anthropic SSE stream.
    #[error("Anthropic API error: {error_type} - {message}")]
    AnthropicStream { error_type: String, message: String },

    #[error("Unsupported message role: {0}")]
    UnsupportedRole(String),

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LlmError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn api(status: u16, status_text: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
        }
    }

    pub fn anthropic_stream(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AnthropicStream {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_format() {
        let err = LlmError::api(429, "Too Many Requests");
        assert_eq!(err.to_string(), "API error: 429 Too Many Requests");
    }

    #[test]
    fn test_anthropic_stream_error_format() {
        let err = LlmError::anthropic_stream("overloaded_error", "Overloaded");
        assert_eq!(
            err.to_string(),
            "Anthropic API error: overloaded_error - Overloaded"
        );
    }
}
