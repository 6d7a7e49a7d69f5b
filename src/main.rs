use clap::Parser;
use futures::StreamExt;
use llm_bridge::config::{config_search_paths, find_config_file};
use llm_bridge::{ClientConfig, Completion, LlmClient, Message, SharedJournal};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "llm-bridge",
    about = "Stream a prompt through OpenAI, Anthropic or Gemini with one interface",
    version
)]
struct Cli {
    /// Prompt to send
    prompt: Option<String>,

    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider name (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Model name (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum output tokens (overrides config)
    #[arg(long)]
    max_tokens: Option<u64>,

    /// System prompt
    #[arg(long)]
    system: Option<String>,

    /// Append a record of the finished generation to this JSONL file
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let Some(prompt) = cli.prompt else {
        anyhow::bail!("No prompt given. Usage: llm-bridge [OPTIONS] <PROMPT>");
    };

    // A provider flag alone is enough to run without a config file
    let mut config = match (&cli.config, &cli.provider) {
        (None, Some(provider)) => {
            ClientConfig::load_or_preset(find_config_file().as_deref(), provider)?
        }
        _ => ClientConfig::find_and_load(cli.config.as_deref())?,
    };

    if let Some(provider) = cli.provider {
        if provider != config.provider.name {
            config.provider.name = provider;
            config.provider.base_url = None;
            config.provider.api_key_env = None;
            config.provider.format = None;
        }
    }
    if let Some(model) = cli.model {
        config.model = Some(model);
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.params.max_tokens = Some(max_tokens);
    }

    let options = config.generate_options()?;
    let vendor = config.vendor()?;
    let base_url = config.effective_base_url()?;
    info!(
        provider = %config.provider.name,
        %vendor,
        %base_url,
        model = %options.model,
        "Configured"
    );

    let mut messages = Vec::new();
    if let Some(system) = cli.system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));

    let mut client = LlmClient::new(config)?;
    if let Some(path) = cli.journal {
        client = client.with_journal(SharedJournal::open(path)?);
    }

    let mut stream = client.stream(&messages, &options).await?;
    let mut stdout = std::io::stdout();
    let mut in_reasoning = false;
    let mut completion = Completion::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;

        if let Some(reasoning) = &chunk.reasoning {
            if !in_reasoning {
                eprintln!("[thinking]");
                in_reasoning = true;
            }
            eprint!("{}", reasoning.delta);
        }
        if !chunk.delta.is_empty() {
            if in_reasoning {
                eprintln!();
                in_reasoning = false;
            }
            write!(stdout, "{}", chunk.delta)?;
            stdout.flush()?;
        }

        completion.absorb(chunk);
    }

    // A chat stream can end with a usage trailer after its finish chunk
    writeln!(stdout)?;
    for call in &completion.tool_calls {
        println!("tool call {} {}({})", call.id, call.name, call.arguments);
    }
    if let Some(usage) = &completion.usage {
        info!(
            finish_reason = completion.finish_reason.map(|r| r.as_str()),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_time_ms = usage.total_time,
            "Done"
        );
    }

    Ok(())
}
