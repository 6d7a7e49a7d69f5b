//! Decoder for OpenAI Responses API streams.
//!
//! Tool calls are items in the response's output list. The item is announced
//! with its `call_id` by `response.output_item.added`, but argument deltas
//! only name the item's `output_index`, so the index is bound to the call id
//! when the item appears.

use tracing::{debug, warn};

use super::openai_types::{ResponsesOutputItem, ResponsesStreamEvent, ResponsesUsage};
use super::state::UnifiedStreamState;
use super::streaming::StreamDecoder;
use super::types::{FinishReason, UnifiedChunk};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct OpenAiResponsesDecoder {
    state: UnifiedStreamState,
}

impl OpenAiResponsesDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &UnifiedStreamState {
        &self.state
    }

    pub fn process_event(&mut self, event: ResponsesStreamEvent) -> Option<UnifiedChunk> {
        match event {
            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                if let ResponsesOutputItem::FunctionCall { call_id, name } = item {
                    self.state.bind_output_index(output_index, &call_id);
                    self.state.init_tool_call(&call_id, &name);
                }
                None
            }
            ResponsesStreamEvent::OutputTextDelta { delta } => {
                self.state.add_content_delta(&delta);
                Some(self.state.create_chunk(&delta, None, None))
            }
            ResponsesStreamEvent::ReasoningDelta { delta } => {
                let reasoning = self.state.add_reasoning_delta(&delta);
                Some(self.state.reasoning_chunk(reasoning))
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta {
                output_index,
                call_id,
                delta,
            } => {
                let id = self.resolve_call_id(output_index, call_id)?;
                self.state
                    .add_tool_call_args(&id, &delta)
                    .then(|| self.state.create_chunk("", None, None))
            }
            ResponsesStreamEvent::FunctionCallArgumentsDone {
                output_index,
                call_id,
                arguments,
            } => {
                let id = self.resolve_call_id(output_index, call_id)?;
                // The done event carries the complete arguments; trust it over the deltas
                self.state
                    .set_tool_call_args(&id, &arguments)
                    .then(|| self.state.create_chunk("", None, None))
            }
            ResponsesStreamEvent::Completed { response, status } => {
                let status = status.or(response.status);
                Some(self.finish(status.as_deref().unwrap_or("completed"), response.usage))
            }
            ResponsesStreamEvent::Incomplete { response } => Some(self.finish(
                response.status.as_deref().unwrap_or("incomplete"),
                response.usage,
            )),
            ResponsesStreamEvent::Failed { response } => Some(self.finish(
                response.status.as_deref().unwrap_or("failed"),
                response.usage,
            )),
            ResponsesStreamEvent::Error { code, message } => {
                warn!(
                    code = code.as_deref().unwrap_or("unknown"),
                    message = message.as_deref().unwrap_or(""),
                    "Responses stream reported an error"
                );
                None
            }
            ResponsesStreamEvent::Unknown => None,
        }
    }

    fn resolve_call_id(&self, output_index: Option<usize>, call_id: Option<String>) -> Option<String> {
        let id = call_id.filter(|id| !id.is_empty()).or_else(|| {
            output_index
                .and_then(|index| self.state.call_id_for_index(index))
                .map(str::to_owned)
        });
        if id.is_none() {
            debug!(?output_index, "Function call event for unknown output item");
        }
        id
    }

    fn finish(&self, status: &str, usage: Option<ResponsesUsage>) -> UnifiedChunk {
        let usage = usage.map(|u| u.to_usage());
        self.state
            .create_chunk("", Some(map_status(status)), usage)
    }
}

impl StreamDecoder for OpenAiResponsesDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>> {
        match serde_json::from_str::<ResponsesStreamEvent>(line) {
            Ok(event) => Ok(self.process_event(event)),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable responses event");
                Ok(None)
            }
        }
    }
}

/// Map a response `status` onto the unified enum.
#[must_use]
pub fn map_status(status: &str) -> FinishReason {
    match status {
        "incomplete" => FinishReason::Length,
        "tool_calls_required" | "failed_function_call" => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    }
}
