//! Stream one prompt through a configured provider.
//!
//! Usage:
//!   export ANTHROPIC_API_KEY=sk-ant-...
//!   cargo run --example basic_stream -- anthropic claude-3-5-haiku-latest

use futures::StreamExt;
use llm_bridge::{ClientConfig, GenerateOptions, LlmClient, Message};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let provider = args.next().unwrap_or_else(|| "openai".to_string());
    let model = args.next().unwrap_or_else(|| "gpt-4o-mini".to_string());

    let config = ClientConfig::for_provider(&provider);
    println!("Provider: {} ({})", provider, config.effective_base_url()?);

    let client = LlmClient::new(config)?;
    let options = GenerateOptions {
        max_tokens: Some(200),
        ..GenerateOptions::new(model)
    };
    let messages = [
        Message::system("You are a geography expert. Be concise."),
        Message::user("What is the capital of France, and why?"),
    ];

    let mut stream = client.stream(&messages, &options).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{}", chunk.delta);
        if let (Some(reason), Some(usage)) = (chunk.finish_reason, &chunk.usage) {
            println!();
            println!(
                "finish={} in={:?} out={:?} ttft={:?}ms",
                reason.as_str(),
                usage.input_tokens,
                usage.output_tokens,
                usage.time_to_first_token
            );
        }
    }

    Ok(())
}
