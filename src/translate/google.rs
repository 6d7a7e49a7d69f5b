//! Decoder for Gemini `streamGenerateContent?alt=sse` streams.
//!
//! Each payload is a complete `GenerateContentResponse` rather than a typed
//! event. Function calls arrive whole (Gemini never splits `args` across
//! payloads), so they are registered and finalized in the payload that
//! carries them.

use tracing::debug;
use uuid::Uuid;

use super::google_types::{FunctionCall, GenerateContentResponse};
use super::state::UnifiedStreamState;
use super::streaming::StreamDecoder;
use super::types::{FinishReason, UnifiedChunk, Usage};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct GoogleDecoder {
    state: UnifiedStreamState,
    /// Usage metadata seen before the payload carrying `finishReason`.
    pending_usage: Option<Usage>,
}

impl GoogleDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &UnifiedStreamState {
        &self.state
    }

    pub fn process_payload(&mut self, payload: GenerateContentResponse) -> Option<UnifiedChunk> {
        let usage = payload
            .usage_metadata
            .as_ref()
            .map(|u| u.to_usage())
            .filter(Usage::has_tokens);

        let Some(candidate) = payload.candidates.and_then(|c| c.into_iter().next()) else {
            let usage = usage.or_else(|| self.pending_usage.take())?;
            return Some(
                self.state
                    .create_chunk("", Some(FinishReason::Stop), Some(usage)),
            );
        };

        if usage.is_some() {
            self.pending_usage = usage;
        }

        let mut text = String::new();
        let mut thoughts = String::new();
        let mut saw_call = false;

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                self.register_call(call);
                saw_call = true;
            }
            match part.text {
                Some(t) if part.thought == Some(true) => thoughts.push_str(&t),
                Some(t) => text.push_str(&t),
                None => {}
            }
        }

        let reasoning = (!thoughts.is_empty()).then(|| self.state.add_reasoning_delta(&thoughts));
        if !text.is_empty() {
            self.state.add_content_delta(&text);
        }

        let finish = candidate.finish_reason.as_deref().map(map_finish_reason);

        let mut out = match finish {
            Some(reason) => self
                .state
                .create_chunk(&text, Some(reason), self.pending_usage.take()),
            None if saw_call => UnifiedChunk {
                tool_calls: self.state.finalize_tool_calls(),
                ..self.state.create_chunk(&text, None, None)
            },
            None if !text.is_empty() || reasoning.is_some() => {
                self.state.create_chunk(&text, None, None)
            }
            None => return None,
        };
        out.reasoning = reasoning;
        Some(out)
    }

    fn register_call(&mut self, call: FunctionCall) {
        let id = call
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
        let arguments = if call.args.is_null() {
            "{}".to_string()
        } else {
            call.args.to_string()
        };
        self.state.init_tool_call(&id, &call.name);
        self.state.set_tool_call_args(&id, &arguments);
    }
}

impl StreamDecoder for GoogleDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>> {
        match serde_json::from_str::<GenerateContentResponse>(line) {
            Ok(payload) => Ok(self.process_payload(payload)),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable Gemini payload");
                Ok(None)
            }
        }
    }
}

/// Map a Gemini `finishReason`. Anything function or tool related is a tool
/// stop; unknown reasons (`SAFETY`, `RECITATION`, ...) end normally.
#[must_use]
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        r if r.contains("FUNCTION") || r.contains("TOOL") => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    }
}
