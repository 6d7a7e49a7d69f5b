//! Decoder for Anthropic Messages API streams.
//!
//! Anthropic addresses every delta by content-block index. A `tool_use`
//! block's id is only sent on `content_block_start`, so the block index is
//! bound to the call id there and `input_json_delta` fragments are routed
//! through that binding.
//!
//! Unlike the other vendors, an in-stream `error` event is fatal: it is
//! returned as [`LlmError::AnthropicStream`] and ends the stream.

use tracing::debug;

use super::anthropic_types::{BlockDelta, BlockStart, StreamEvent, StreamUsage};
use super::state::UnifiedStreamState;
use super::streaming::StreamDecoder;
use super::types::{FinishReason, UnifiedChunk, Usage};
use crate::error::{LlmError, Result};

#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    state: UnifiedStreamState,
    /// Counts from `message_start`, merged into the terminal usage.
    start_usage: StreamUsage,
}

impl AnthropicDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &UnifiedStreamState {
        &self.state
    }

    pub fn process_event(&mut self, event: StreamEvent) -> Result<Option<UnifiedChunk>> {
        let chunk = match event {
            StreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.start_usage = usage;
                }
                None
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if let BlockStart::ToolUse { id, name } = content_block {
                    self.state.bind_output_index(index, &id);
                    self.state.init_tool_call(&id, &name);
                }
                None
            }
            StreamEvent::ContentBlockDelta { index, delta } => self.process_delta(index, delta),
            StreamEvent::MessageDelta { delta, usage } => match delta.stop_reason {
                Some(reason) => Some(self.finish(&reason, usage.unwrap_or_default())),
                None => None,
            },
            StreamEvent::Error { error } => {
                return Err(LlmError::anthropic_stream(error.error_type, error.message));
            }
            StreamEvent::ContentBlockStop { .. }
            | StreamEvent::MessageStop
            | StreamEvent::Ping
            | StreamEvent::Unknown => None,
        };
        Ok(chunk)
    }

    fn process_delta(&mut self, index: usize, delta: BlockDelta) -> Option<UnifiedChunk> {
        match delta {
            BlockDelta::TextDelta { text } => {
                self.state.add_content_delta(&text);
                Some(self.state.create_chunk(&text, None, None))
            }
            BlockDelta::InputJsonDelta { partial_json } => {
                let Some(id) = self.state.call_id_for_index(index).map(str::to_owned) else {
                    debug!(index, "input_json_delta for a block that is not a tool call");
                    return None;
                };
                self.state
                    .add_tool_call_args(&id, &partial_json)
                    .then(|| self.state.create_chunk("", None, None))
            }
            BlockDelta::ThinkingDelta { thinking } => {
                let reasoning = self.state.add_reasoning_delta(&thinking);
                Some(self.state.reasoning_chunk(reasoning))
            }
            // Signatures only let the API verify thinking blocks later
            BlockDelta::SignatureDelta | BlockDelta::Other => None,
        }
    }

    fn finish(&self, stop_reason: &str, delta_usage: StreamUsage) -> UnifiedChunk {
        let input_tokens = delta_usage.input_tokens.or(self.start_usage.input_tokens);
        let output_tokens = delta_usage.output_tokens;
        let usage = Usage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.zip(output_tokens).map(|(i, o)| i + o),
            cache_tokens: delta_usage
                .cache_read_input_tokens
                .or(self.start_usage.cache_read_input_tokens),
            ..Usage::default()
        };

        match map_stop_reason(stop_reason) {
            Some(reason) => self.state.create_chunk("", Some(reason), Some(usage)),
            None => {
                debug!(stop_reason, "Unrecognized Anthropic stop_reason");
                UnifiedChunk {
                    tool_calls: self.state.finalize_tool_calls(),
                    usage: Some(usage),
                    ..self.state.create_chunk("", None, None)
                }
            }
        }
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>> {
        match serde_json::from_str::<StreamEvent>(line) {
            Ok(event) => self.process_event(event),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable Anthropic event");
                Ok(None)
            }
        }
    }
}

/// Map an Anthropic `stop_reason`. Unrecognized reasons stay unset.
#[must_use]
pub fn map_stop_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "end_turn" | "stop_sequence" | "pause_turn" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolUse),
        "refusal" => Some(FinishReason::Error),
        _ => None,
    }
}
