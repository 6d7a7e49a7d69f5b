//! The provider-agnostic model shared by every vendor adapter.
//!
//! Callers describe a generation with [`Message`]s and [`GenerateOptions`];
//! decoders hand back a sequence of [`UnifiedChunk`]s regardless of which
//! vendor produced the stream.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl FromStr for Role {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            // Gemini calls the assistant "model"
            "assistant" | "model" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            _ => Err(LlmError::UnsupportedRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Tool invocations previously made by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For `Role::Tool` messages: the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `Role::Tool` messages: the tool's name (Gemini requires it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Token budget for reasoning/thinking, where the vendor supports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_budget: Option<u64>,
}

impl GenerateOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

/// A finalized tool invocation with parsed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    Error,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolUse => "tool_use",
            FinishReason::Error => "error",
        }
    }
}

/// Token and timing accounting. Timing values are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u64>,
}

impl Usage {
    /// True when at least one token count was reported.
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.input_tokens.is_some()
            || self.output_tokens.is_some()
            || self.total_tokens.is_some()
            || self.reasoning_tokens.is_some()
            || self.cache_tokens.is_some()
    }

    /// Fill any field left unset in `self` from `other`.
    #[must_use]
    pub fn or(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.or(other.input_tokens),
            output_tokens: self.output_tokens.or(other.output_tokens),
            total_tokens: self.total_tokens.or(other.total_tokens),
            reasoning_tokens: self.reasoning_tokens.or(other.reasoning_tokens),
            cache_tokens: self.cache_tokens.or(other.cache_tokens),
            time_to_first_token: self.time_to_first_token.or(other.time_to_first_token),
            total_time: self.total_time.or(other.total_time),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningChunk {
    /// All reasoning text so far.
    pub content: String,
    /// Reasoning text added by this chunk.
    pub delta: String,
}

/// One user-visible increment of a generation.
///
/// `content` is cumulative; `delta` is only what this chunk added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedChunk {
    pub content: String,
    pub delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl UnifiedChunk {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("model".parse::<Role>().unwrap(), Role::Assistant);

        let err = "narrator".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported message role: narrator");
    }

    #[test]
    fn test_chunk_serializes_camel_case() {
        let chunk = UnifiedChunk {
            content: "Hi".to_string(),
            delta: String::new(),
            finish_reason: Some(FinishReason::ToolUse),
            usage: Some(Usage {
                input_tokens: Some(3),
                time_to_first_token: Some(12),
                ..Usage::default()
            }),
            ..UnifiedChunk::default()
        };

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["finishReason"], "tool_use");
        assert_eq!(json["usage"]["inputTokens"], 3);
        assert_eq!(json["usage"]["timeToFirstToken"], 12);
        assert!(json.get("toolCalls").is_none());
        assert!(json.get("reasoning").is_none());
    }

    #[test]
    fn test_usage_or_keeps_own_values() {
        let merged = Usage {
            output_tokens: Some(5),
            ..Usage::default()
        }
        .or(Usage {
            input_tokens: Some(10),
            output_tokens: Some(99),
            ..Usage::default()
        });

        assert_eq!(merged.input_tokens, Some(10));
        assert_eq!(merged.output_tokens, Some(5));
        assert!(merged.has_tokens());
        assert!(!Usage::default().has_tokens());
    }
}
