use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use konspekt_core::{
    Assistant, Provider, ProviderAssistant, ScriptedAssistant, SessionConfig, SessionController,
    TimestampRule, VideoSelection,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod repl;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "konspekt")]
#[command(about = "Watch a YouTube video with AI keypoints, personal notes and a Q&A assistant")]
struct Cli {
    /// Video URL to attach on start
    #[arg(short, long)]
    url: Option<String>,

    /// Video name shown as the player title
    #[arg(short, long, requires = "url")]
    name: Option<String>,

    /// Video description
    #[arg(short, long, requires = "url")]
    description: Option<String>,

    /// AI provider for keypoints and chat
    #[arg(short, long, default_value = "grok")]
    provider: CliProvider,

    /// Use the built-in scripted assistant instead of a provider
    #[arg(long)]
    offline: bool,

    /// Simulated response time of the scripted assistant
    #[arg(long, default_value_t = 1500, requires = "offline")]
    latency_ms: u64,

    /// Only accept personal-note timestamps formatted as HH:MM:SS
    #[arg(long)]
    strict_timestamps: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_assistant(cli: &Cli) -> Result<Arc<dyn Assistant>> {
    if cli.offline {
        return Ok(Arc::new(ScriptedAssistant::new(Duration::from_millis(
            cli.latency_ms,
        ))));
    }

    let provider: Provider = cli.provider.clone().into();
    Ok(Arc::new(ProviderAssistant::new(provider)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Validate API key early
    let assistant = match build_assistant(&cli) {
        Ok(assistant) => assistant,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            eprintln!("{}", style("Hint: run with --offline to try the scripted assistant").dim());
            std::process::exit(1);
        }
    };

    let rule = if cli.strict_timestamps {
        TimestampRule::Clock
    } else {
        TimestampRule::FreeText
    };
    let mut controller =
        SessionController::new(assistant, SessionConfig::default().with_timestamp_rule(rule));

    println!(
        "\n{}  {}\n",
        style("konspekt").cyan().bold(),
        style("Video Learning Assistant").dim()
    );

    let initial = cli.url.map(|url| VideoSelection {
        source_url: Some(url),
        name: cli.name,
        description: cli.description,
    });

    repl::run(&mut controller, initial).await
}
