//! Per-generation bookkeeping shared by every vendor decoder.
//!
//! [`UnifiedStreamState`] owns the running content and reasoning text, the
//! tool calls being assembled from argument fragments, and the timing marks
//! reported on the terminal chunk. Nothing here returns an error: malformed
//! argument JSON degrades to `{}` and fragments for unknown calls are dropped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use super::types::{FinishReason, ReasoningChunk, ToolCall, UnifiedChunk, Usage};

/// Parse `text` as JSON, returning `fallback` when it is not valid JSON.
#[must_use]
pub fn parse_or_default(text: &str, fallback: Value) -> Value {
    serde_json::from_str(text).unwrap_or(fallback)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Growing buffer of JSON text that is only parsed once complete.
///
/// Vendors split tool-call arguments at arbitrary byte positions, so no
/// prefix is expected to parse on its own.
#[derive(Debug, Clone, Default)]
pub struct JsonAccumulator {
    buffer: String,
}

impl JsonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    /// Discard everything accumulated so far and keep `full` instead.
    pub fn replace(&mut self, full: &str) {
        self.buffer.clear();
        self.buffer.push_str(full);
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Parse the buffer, or `{}` if it never became valid JSON.
    #[must_use]
    pub fn finalize(&self) -> Value {
        parse_or_default(&self.buffer, empty_object())
    }
}

/// Name and raw argument text of one tool call under construction.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    pub name: String,
    pub arguments: JsonAccumulator,
}

#[derive(Debug)]
pub struct UnifiedStreamState {
    content: String,
    reasoning: String,
    tool_calls: HashMap<String, ToolCallAccumulator>,
    /// Registration order of `tool_calls`, so finalized calls come out stable.
    tool_call_order: Vec<String>,
    output_index_to_call_id: HashMap<usize, String>,
    first_content_token_at: Option<Instant>,
    first_reasoning_token_at: Option<Instant>,
    started_at: Instant,
}

impl Default for UnifiedStreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedStreamState {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            reasoning: String::new(),
            tool_calls: HashMap::new(),
            tool_call_order: Vec::new(),
            output_index_to_call_id: HashMap::new(),
            first_content_token_at: None,
            first_reasoning_token_at: None,
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    #[must_use]
    pub fn first_content_token_at(&self) -> Option<Instant> {
        self.first_content_token_at
    }

    #[must_use]
    pub fn first_reasoning_token_at(&self) -> Option<Instant> {
        self.first_reasoning_token_at
    }

    pub fn add_content_delta(&mut self, text: &str) {
        self.content.push_str(text);
        if self.first_content_token_at.is_none() && !text.trim().is_empty() {
            self.first_content_token_at = Some(Instant::now());
        }
    }

    pub fn add_reasoning_delta(&mut self, text: &str) -> ReasoningChunk {
        self.reasoning.push_str(text);
        if self.first_reasoning_token_at.is_none() && !text.trim().is_empty() {
            self.first_reasoning_token_at = Some(Instant::now());
        }
        ReasoningChunk {
            content: self.reasoning.clone(),
            delta: text.to_string(),
        }
    }

    /// Register a tool call with empty arguments. Re-registering an id resets it.
    pub fn init_tool_call(&mut self, id: &str, name: &str) {
        let previous = self.tool_calls.insert(
            id.to_string(),
            ToolCallAccumulator {
                name: name.to_string(),
                arguments: JsonAccumulator::new(),
            },
        );
        if previous.is_none() {
            self.tool_call_order.push(id.to_string());
        }
    }

    #[must_use]
    pub fn has_tool_call(&self, id: &str) -> bool {
        self.tool_calls.contains_key(id)
    }

    /// Append an argument fragment. Returns `false` (and does nothing) for unknown ids.
    pub fn add_tool_call_args(&mut self, id: &str, fragment: &str) -> bool {
        match self.tool_calls.get_mut(id) {
            Some(call) => {
                call.arguments.append(fragment);
                true
            }
            None => false,
        }
    }

    /// Overwrite a call's arguments with the vendor's authoritative final text.
    pub fn set_tool_call_args(&mut self, id: &str, arguments: &str) -> bool {
        match self.tool_calls.get_mut(id) {
            Some(call) => {
                call.arguments.replace(arguments);
                true
            }
            None => false,
        }
    }

    pub fn bind_output_index(&mut self, index: usize, call_id: &str) {
        self.output_index_to_call_id
            .insert(index, call_id.to_string());
    }

    #[must_use]
    pub fn call_id_for_index(&self, index: usize) -> Option<&str> {
        self.output_index_to_call_id.get(&index).map(String::as_str)
    }

    /// Parse every registered call's arguments.
    ///
    /// `None` means no tool call was ever registered, as opposed to
    /// `Some(vec)` of calls that may have empty arguments.
    #[must_use]
    pub fn finalize_tool_calls(&self) -> Option<Vec<ToolCall>> {
        if self.tool_call_order.is_empty() {
            return None;
        }
        Some(
            self.tool_call_order
                .iter()
                .filter_map(|id| {
                    self.tool_calls.get(id).map(|call| ToolCall {
                        id: id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.finalize(),
                    })
                })
                .collect(),
        )
    }

    /// Time from stream start to the first non-blank content or reasoning token.
    #[must_use]
    pub fn time_to_first_token(&self) -> Option<Duration> {
        let first = match (self.first_content_token_at, self.first_reasoning_token_at) {
            (Some(c), Some(r)) => Some(c.min(r)),
            (c, r) => c.or(r),
        };
        first.map(|at| at.duration_since(self.started_at))
    }

    /// Build a chunk from the running totals.
    ///
    /// Only a chunk with a `finish` reason carries tool calls and usage;
    /// timing figures are merged over `existing_usage` in that case.
    #[must_use]
    pub fn create_chunk(
        &self,
        delta: &str,
        finish: Option<FinishReason>,
        existing_usage: Option<Usage>,
    ) -> UnifiedChunk {
        let (tool_calls, usage) = match finish {
            Some(_) => {
                let timing = Usage {
                    time_to_first_token: self.time_to_first_token().map(duration_ms),
                    total_time: Some(duration_ms(self.started_at.elapsed())),
                    ..Usage::default()
                };
                let usage = match existing_usage {
                    Some(existing) => timing.or(existing),
                    None => timing,
                };
                (self.finalize_tool_calls(), Some(usage))
            }
            None => (None, None),
        };

        UnifiedChunk {
            content: self.content.clone(),
            delta: delta.to_string(),
            reasoning: None,
            tool_calls,
            finish_reason: finish,
            usage,
        }
    }

    /// A chunk that only reports reasoning progress.
    #[must_use]
    pub fn reasoning_chunk(&self, reasoning: ReasoningChunk) -> UnifiedChunk {
        UnifiedChunk {
            reasoning: Some(reasoning),
            ..self.create_chunk("", None, None)
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or_default("{\"a\":1}", json!({})), json!({"a": 1}));
        assert_eq!(parse_or_default("{\"a\":", json!({})), json!({}));
        assert_eq!(parse_or_default("", json!(null)), json!(null));
    }

    #[test]
    fn test_accumulator_finalizes_only_complete_json() {
        let mut acc = JsonAccumulator::new();
        acc.append("{\"location\":");
        assert_eq!(acc.finalize(), json!({}));
        acc.append(" \"SF\"}");
        assert_eq!(acc.finalize(), json!({"location": "SF"}));

        acc.replace("{\"location\":\"NY\"}");
        assert_eq!(acc.as_str(), "{\"location\":\"NY\"}");
    }

    #[test]
    fn test_tool_call_round_trip() {
        let mut state = UnifiedStreamState::new();
        state.init_tool_call("call_1", "get_weather");
        assert!(state.add_tool_call_args("call_1", "{\"location\":"));
        assert!(state.add_tool_call_args("call_1", " \"SF\"}"));

        let calls = state.finalize_tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, json!({"location": "SF"}));
    }

    #[test]
    fn test_malformed_arguments_finalize_to_empty_object() {
        let mut state = UnifiedStreamState::new();
        state.init_tool_call("call_1", "broken");
        state.add_tool_call_args("call_1", "{\"invalid\":");
        state.add_tool_call_args("call_1", " malformed");

        let calls = state.finalize_tool_calls().unwrap();
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_unregistered_tool_id_is_ignored() {
        let mut state = UnifiedStreamState::new();
        assert!(state.finalize_tool_calls().is_none());
        assert!(!state.add_tool_call_args("nonexistent", "{\"a\":1}"));
        assert!(!state.has_tool_call("nonexistent"));
        assert!(state.finalize_tool_calls().is_none());

        state.init_tool_call("call_1", "f");
        assert!(!state.add_tool_call_args("nonexistent", "{\"a\":1}"));
        let calls = state.finalize_tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_reinit_resets_arguments_but_keeps_order() {
        let mut state = UnifiedStreamState::new();
        state.init_tool_call("a", "first");
        state.init_tool_call("b", "second");
        state.add_tool_call_args("a", "{\"x\":1}");
        state.init_tool_call("a", "renamed");

        let calls = state.finalize_tool_calls().unwrap();
        let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(calls[0].name, "renamed");
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_first_token_ignores_blank_deltas() {
        let mut state = UnifiedStreamState::new();
        state.add_content_delta("");
        state.add_content_delta("   ");
        assert!(state.first_content_token_at().is_none());
        assert!(state.time_to_first_token().is_none());

        state.add_content_delta("Hi");
        assert!(state.first_content_token_at().is_some());
        assert_eq!(state.content(), "   Hi");
    }

    #[test]
    fn test_reasoning_delta_returns_running_total() {
        let mut state = UnifiedStreamState::new();
        state.add_reasoning_delta("Let me ");
        let r = state.add_reasoning_delta("think");
        assert_eq!(r.content, "Let me think");
        assert_eq!(r.delta, "think");
        assert!(state.first_reasoning_token_at().is_some());
        assert!(state.time_to_first_token().is_some());
    }

    #[test]
    fn test_intermediate_chunk_has_no_usage_or_tool_calls() {
        let mut state = UnifiedStreamState::new();
        state.init_tool_call("call_1", "f");
        state.add_content_delta("Hello");

        let chunk = state.create_chunk("Hello", None, None);
        assert_eq!(chunk.content, "Hello");
        assert_eq!(chunk.delta, "Hello");
        assert!(chunk.usage.is_none());
        assert!(chunk.tool_calls.is_none());
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn test_terminal_chunk_merges_usage_and_timing() {
        let mut state = UnifiedStreamState::new();
        state.add_content_delta("Hello");

        let existing = Usage {
            input_tokens: Some(10),
            output_tokens: Some(2),
            ..Usage::default()
        };
        let chunk = state.create_chunk("", Some(FinishReason::Stop), Some(existing));
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(2));
        assert!(usage.time_to_first_token.is_some());
        assert!(usage.total_time.is_some());
        assert!(chunk.tool_calls.is_none());
    }

    #[test]
    fn test_terminal_chunk_without_tokens_has_no_first_token_time() {
        let state = UnifiedStreamState::new();
        let chunk = state.create_chunk("", Some(FinishReason::Length), None);
        let usage = chunk.usage.unwrap();
        assert!(usage.time_to_first_token.is_none());
        assert!(usage.total_time.is_some());
    }

    #[test]
    fn test_output_index_binding() {
        let mut state = UnifiedStreamState::new();
        assert!(state.call_id_for_index(0).is_none());
        state.bind_output_index(2, "call_9");
        assert_eq!(state.call_id_for_index(2), Some("call_9"));
    }
}
