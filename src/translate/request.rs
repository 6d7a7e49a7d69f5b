//! Build vendor request bodies from the unified message list.
//!
//! Each builder is a pure function from `(&[Message], &GenerateOptions)` to
//! the vendor's typed request. System messages are hoisted to wherever the
//! vendor wants them (`system`, `instructions`, `systemInstruction`), and
//! tool calls and tool results are re-expressed in the vendor's own shape.

use super::anthropic_types::{
    AnthropicMessage, ContentBlock, MessagesRequest, ThinkingConfig as AnthropicThinking, Tool,
};
use super::google_types::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateContentRequest,
    GenerationConfig, GoogleTool, Part, ThinkingConfig as GoogleThinking,
};
use super::openai_types::{
    ChatCompletionRequest, ChatFunction, ChatMessage, ChatTool, ChatToolCall,
    ChatToolCallFunction, ResponsesInputItem, ResponsesRequest, ResponsesTool, StreamOptions,
};
use super::types::{GenerateOptions, Message, Role};
use crate::error::Result;
use crate::providers::Vendor;

/// Anthropic requires `max_tokens`; this is used when the caller gave none.
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: u64 = 4096;

/// Serialize the request body for `vendor`.
pub fn build_request(
    vendor: Vendor,
    messages: &[Message],
    options: &GenerateOptions,
) -> Result<serde_json::Value> {
    let body = match vendor {
        Vendor::OpenAiChat => serde_json::to_value(to_chat_request(messages, options))?,
        Vendor::OpenAiResponses => serde_json::to_value(to_responses_request(messages, options))?,
        Vendor::Anthropic => serde_json::to_value(to_messages_request(messages, options))?,
        Vendor::Google => serde_json::to_value(to_gemini_request(messages, options))?,
    };
    Ok(body)
}

fn system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    (!items.is_empty()).then(|| items.to_vec())
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions
// ---------------------------------------------------------------------------

pub fn to_chat_request(messages: &[Message], options: &GenerateOptions) -> ChatCompletionRequest {
    let tools = (!options.tools.is_empty()).then(|| {
        options
            .tools
            .iter()
            .map(|t| ChatTool {
                tool_type: "function",
                function: ChatFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    });

    ChatCompletionRequest {
        model: options.model.clone(),
        messages: messages.iter().map(chat_message).collect(),
        stream: true,
        stream_options: StreamOptions {
            include_usage: true,
        },
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        top_p: options.top_p,
        stop: non_empty(&options.stop),
        tools,
    }
}

fn chat_message(msg: &Message) -> ChatMessage {
    let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
        msg.tool_calls
            .iter()
            .map(|call| ChatToolCall {
                id: call.id.clone(),
                call_type: "function",
                function: ChatToolCallFunction {
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                },
            })
            .collect::<Vec<_>>()
    });

    // An assistant turn that only calls tools sends `content: null`
    let content = if tool_calls.is_some() && msg.content.is_empty() {
        None
    } else {
        Some(msg.content.clone())
    };

    ChatMessage {
        role: msg.role.as_str().to_string(),
        content,
        tool_calls,
        tool_call_id: msg.tool_call_id.clone(),
    }
}

// ---------------------------------------------------------------------------
// OpenAI Responses
// ---------------------------------------------------------------------------

pub fn to_responses_request(messages: &[Message], options: &GenerateOptions) -> ResponsesRequest {
    let mut input = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {}
            Role::User => input.push(ResponsesInputItem::Message {
                role: "user".to_string(),
                content: msg.content.clone(),
            }),
            Role::Assistant => {
                if !msg.content.is_empty() || msg.tool_calls.is_empty() {
                    input.push(ResponsesInputItem::Message {
                        role: "assistant".to_string(),
                        content: msg.content.clone(),
                    });
                }
                input.extend(msg.tool_calls.iter().map(|call| {
                    ResponsesInputItem::FunctionCall {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    }
                }));
            }
            Role::Tool => input.push(ResponsesInputItem::FunctionCallOutput {
                call_id: msg.tool_call_id.clone().unwrap_or_default(),
                output: msg.content.clone(),
            }),
        }
    }

    let tools = (!options.tools.is_empty()).then(|| {
        options
            .tools
            .iter()
            .map(|t| ResponsesTool {
                tool_type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect()
    });

    ResponsesRequest {
        model: options.model.clone(),
        input,
        stream: true,
        instructions: system_prompt(messages),
        max_output_tokens: options.max_tokens,
        temperature: options.temperature,
        top_p: options.top_p,
        tools,
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages
// ---------------------------------------------------------------------------

pub fn to_messages_request(messages: &[Message], options: &GenerateOptions) -> MessagesRequest {
    let mut out: Vec<AnthropicMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => continue,
            Role::User => ("user", vec![ContentBlock::Text {
                text: msg.content.clone(),
            }]),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() || msg.tool_calls.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                blocks.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }));
                ("assistant", blocks)
            }
            // Tool results travel inside a user turn
            Role::Tool => ("user", vec![ContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: msg.content.clone(),
            }]),
        };

        // The API rejects consecutive turns with the same role
        match out.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => out.push(AnthropicMessage {
                role: role.to_string(),
                content: blocks,
            }),
        }
    }

    let tools = (!options.tools.is_empty()).then(|| {
        options
            .tools
            .iter()
            .map(|t| Tool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    });

    MessagesRequest {
        model: options.model.clone(),
        max_tokens: options.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
        messages: out,
        stream: true,
        system: system_prompt(messages),
        temperature: options.temperature,
        top_p: options.top_p,
        stop_sequences: non_empty(&options.stop),
        tools,
        thinking: options.reasoning_budget.map(|budget| AnthropicThinking {
            thinking_type: "enabled",
            budget_tokens: budget,
        }),
    }
}

// ---------------------------------------------------------------------------
// Google Gemini
// ---------------------------------------------------------------------------

pub fn to_gemini_request(messages: &[Message], options: &GenerateOptions) -> GenerateContentRequest {
    let mut contents: Vec<Content> = Vec::new();

    for msg in messages {
        let (role, parts) = match msg.role {
            Role::System => continue,
            Role::User => ("user", vec![Part::text(&msg.content)]),
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() || msg.tool_calls.is_empty() {
                    parts.push(Part::text(&msg.content));
                }
                parts.extend(msg.tool_calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        id: None,
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Part::default()
                }));
                ("model", parts)
            }
            Role::Tool => ("user", vec![function_response_part(msg)]),
        };

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts,
            }),
        }
    }

    let generation_config = GenerationConfig {
        max_output_tokens: options.max_tokens,
        temperature: options.temperature,
        top_p: options.top_p,
        stop_sequences: non_empty(&options.stop),
        thinking_config: options.reasoning_budget.map(|budget| GoogleThinking {
            thinking_budget: budget,
            include_thoughts: true,
        }),
    };

    let tools = (!options.tools.is_empty()).then(|| {
        vec![GoogleTool {
            function_declarations: options
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    });

    GenerateContentRequest {
        contents,
        system_instruction: system_prompt(messages).map(|text| Content {
            role: None,
            parts: vec![Part::text(text)],
        }),
        generation_config: generation_config.into_option(),
        tools,
    }
}

/// `functionResponse.response` must be a JSON object; plain-text tool output
/// is wrapped as `{"content": ...}`.
fn function_response_part(msg: &Message) -> Part {
    let response = match serde_json::from_str::<serde_json::Value>(&msg.content) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => serde_json::json!({ "content": msg.content }),
    };
    let name = msg
        .name
        .clone()
        .or_else(|| msg.tool_call_id.clone())
        .unwrap_or_default();

    Part {
        function_response: Some(FunctionResponse { name, response }),
        ..Part::default()
    }
}
