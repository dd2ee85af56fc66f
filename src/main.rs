mod config;
mod console;
mod gemini;
mod prompt;
mod session;
mod upload;

use anyhow::{Context, Result};
use clap::Parser;
use session::{Session, SessionMode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload::UploadRelay;

#[derive(Debug, Parser)]
#[command(version, about = "Generate a BigQuery script from an ER diagram via Gemini")]
struct Cli {
    /// Path to the entity relationship diagram (png, jpg, or jpeg)
    diagram: PathBuf,

    /// Request the script immediately instead of starting an interactive chat
    #[arg(long)]
    script_only: bool,

    /// Sampling temperature (0.0 to 1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling cutoff (0.0 to 1.0)
    #[arg(long)]
    top_p: Option<f32>,

    /// Top-k sampling (0 to 100)
    #[arg(long)]
    top_k: Option<u32>,

    /// Response token budget (1 to 8192)
    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Path to the config file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_file(&cli.config)?;

    let mut generation = config.generation;
    if let Some(temperature) = cli.temperature {
        generation.temperature = temperature;
    }
    if let Some(top_p) = cli.top_p {
        generation.top_p = top_p;
    }
    if let Some(top_k) = cli.top_k {
        generation.top_k = top_k;
    }
    if let Some(max_output_tokens) = cli.max_output_tokens {
        generation.max_output_tokens = max_output_tokens;
    }
    generation.validate()?;

    let mime_type = upload::mime_for_path(&cli.diagram).with_context(|| {
        format!(
            "Unsupported diagram format: {} (expected png, jpg, or jpeg)",
            cli.diagram.display()
        )
    })?;

    let mut client = gemini::Client::new(&config.api_key, &config.model);
    if let Some(base_url) = &config.base_url {
        client = client.with_base_url(base_url);
    }
    let client = Arc::new(client);

    let relay = UploadRelay::new(client.clone(), config.data_dir.join("upload"));
    let mode = if cli.script_only {
        SessionMode::ScriptOnly
    } else {
        SessionMode::Chat
    };
    let mut session = Session::new(client, generation, mode);

    console::run(&mut session, &relay, &cli.diagram, mime_type).await
}
