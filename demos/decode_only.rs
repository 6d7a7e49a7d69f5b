//! Decode canned SSE payloads without any network access.
//!
//! Usage:
//!   `cargo run --example decode_only`

use llm_bridge::translate::anthropic::AnthropicDecoder;
use llm_bridge::translate::openai_chat::OpenAiChatDecoder;
use llm_bridge::{build_request, decode_lines, GenerateOptions, Message, Vendor};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    // What goes out: the same conversation in two wire formats
    let messages = [Message::system("Be brief."), Message::user("Weather in Oslo?")];
    let options = GenerateOptions::new("demo-model");
    for vendor in [Vendor::OpenAiChat, Vendor::Google] {
        let body = build_request(vendor, &messages, &options)?;
        println!("{vendor} request:\n{}\n", serde_json::to_string_pretty(&body)?);
    }

    // What comes back: an OpenAI Chat stream with a fragmented tool call
    let chat_lines = [
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "function": {"name": "get_weather", "arguments": "{\"city\":"}}
        ]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": " \"Oslo\"}"}}]}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
    ]
    .map(|v| v.to_string());

    println!("OpenAI Chat chunks:");
    for chunk in decode_lines(chat_lines, OpenAiChatDecoder::new()) {
        println!("  {}", serde_json::to_string(&chunk?)?);
    }

    // Anthropic streams can carry a fatal error event
    let anthropic_lines = [
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Looking"}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    ]
    .map(|v| v.to_string());

    println!("\nAnthropic chunks:");
    for result in decode_lines(anthropic_lines, AnthropicDecoder::new()) {
        match result {
            Ok(chunk) => println!("  {}", serde_json::to_string(&chunk)?),
            Err(e) => println!("  stream aborted: {e}"),
        }
    }

    Ok(())
}
