//! Decoder for OpenAI Chat Completions streams.
//!
//! Each payload is a `chat.completion.chunk`. Tool calls are addressed by
//! their position in `delta.tool_calls`; only the first fragment of a call
//! carries its `id`, so later fragments are routed through the stream state's
//! output-index table.

use tracing::debug;

use super::openai_types::{ChatCompletionChunk, ChunkToolCall};
use super::state::UnifiedStreamState;
use super::streaming::StreamDecoder;
use super::types::{FinishReason, UnifiedChunk, Usage};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct OpenAiChatDecoder {
    state: UnifiedStreamState,
    pending_usage: Option<Usage>,
}

impl OpenAiChatDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &UnifiedStreamState {
        &self.state
    }

    /// Process a single chunk, returning the chunk to show the caller, if any.
    pub fn process_chunk(&mut self, chunk: ChatCompletionChunk) -> Option<UnifiedChunk> {
        let usage = chunk
            .usage
            .as_ref()
            .map(|u| u.to_usage())
            .filter(Usage::has_tokens);

        let Some(choice) = chunk.choices.and_then(|c| c.into_iter().next()) else {
            // Usage-only trailer sent when `stream_options.include_usage` is set
            let usage = usage?;
            return Some(self.state.create_chunk("", Some(FinishReason::Stop), Some(usage)));
        };

        if usage.is_some() {
            self.pending_usage = usage;
        }

        let delta = choice.delta.unwrap_or_default();

        let reasoning = delta
            .reasoning
            .or(delta.reasoning_content)
            .filter(|r| !r.is_empty())
            .map(|r| self.state.add_reasoning_delta(&r));

        let mut saw_tool_calls = false;
        for call in delta.tool_calls.into_iter().flatten() {
            saw_tool_calls |= self.apply_tool_call_delta(call);
        }

        let content = delta.content.filter(|c| !c.is_empty());
        if let Some(ref text) = content {
            self.state.add_content_delta(text);
        }
        let text = content.as_deref().unwrap_or("");

        let finish = choice.finish_reason.as_deref().map(map_finish_reason);

        let mut out = match finish {
            Some(reason) => {
                self.state
                    .create_chunk(text, Some(reason), self.pending_usage.take())
            }
            None if content.is_some() || reasoning.is_some() || saw_tool_calls => {
                self.state.create_chunk(text, None, None)
            }
            None => return None,
        };
        out.reasoning = reasoning;
        Some(out)
    }

    /// Returns `false` when the fragment could not be routed to a call.
    fn apply_tool_call_delta(&mut self, call: ChunkToolCall) -> bool {
        let index = call.index.unwrap_or(0);
        let function = call.function.unwrap_or_default();

        // An entry carrying an id starts that call over
        if let Some(id) = call.id.filter(|id| !id.is_empty()) {
            self.state.bind_output_index(index, &id);
            self.state
                .init_tool_call(&id, function.name.as_deref().unwrap_or_default());
        }

        let Some(id) = self.state.call_id_for_index(index).map(str::to_owned) else {
            debug!(index, "Tool call fragment for unknown index");
            return false;
        };

        if let Some(args) = function.arguments {
            self.state.add_tool_call_args(&id, &args);
        }
        true
    }
}

impl StreamDecoder for OpenAiChatDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>> {
        match serde_json::from_str::<ChatCompletionChunk>(line) {
            Ok(chunk) => Ok(self.process_chunk(chunk)),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable chat chunk");
                Ok(None)
            }
        }
    }
}

/// Map a Chat Completions `finish_reason` onto the unified enum.
#[must_use]
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    }
}
