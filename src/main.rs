//! # askd CLI
//!
//! The `askd` binary runs the question answering service and offers
//! one-shot subcommands for working against the same pipeline in-process.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askd serve` | Start the HTTP service |
//! | `askd chat "<message>"` | One-shot chat (no documents) |
//! | `askd ask "<question>" --file <path>` | One-shot RAG over local files |
//! | `askd health` | Probe the configured backend and print status |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; a missing file falls back to defaults. See
//! `config/askd.example.toml` for a full example.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use askd::config;
use askd::server;
use askd::service::AppContext;

/// askd — a self-contained retrieval-augmented question answering daemon.
#[derive(Parser)]
#[command(
    name = "askd",
    about = "A self-contained retrieval-augmented question answering daemon",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    Serve,

    /// Ask a one-shot question over local files (RAG).
    Ask {
        /// The question to answer.
        question: String,
        /// Text or markdown files to ground the answer in. Repeatable.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Session id to continue a conversation.
        #[arg(long)]
        session: Option<String>,
    },

    /// Send a one-shot chat message (no documents).
    Chat {
        /// The message to send.
        message: String,
        /// Session id to continue a conversation.
        #[arg(long)]
        session: Option<String>,
    },

    /// Probe the configured backend and print a health summary.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askd=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(config).await?;
        }
        Commands::Ask {
            question,
            files,
            session,
        } => {
            let ctx = Arc::new(AppContext::new(config).map_err(|e| anyhow::anyhow!(e))?);

            for path in &files {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .ok_or_else(|| anyhow::anyhow!("not a file: {}", path.display()))?;
                let content = std::fs::read(path)
                    .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
                let receipt = ctx
                    .upload_document(&filename, &content)
                    .await
                    .map_err(|e| anyhow::anyhow!(e))?;
                println!("indexed {} ({} bytes)", receipt.filename, receipt.size);
            }

            let result = ctx
                .ask(&question, session.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!(e))?;

            println!();
            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &result.sources {
                    println!("  {}", source);
                }
            }
            println!();
            println!("({} ms, session {})", result.latency_ms, result.session_id);
        }
        Commands::Chat { message, session } => {
            let ctx = Arc::new(AppContext::new(config).map_err(|e| anyhow::anyhow!(e))?);
            let result = ctx
                .chat(&message, session.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!(e))?;

            println!("{}", result.answer);
            println!();
            println!("({} ms, session {})", result.latency_ms, result.session_id);
        }
        Commands::Health => {
            let ctx = Arc::new(AppContext::new(config).map_err(|e| anyhow::anyhow!(e))?);
            let snapshot = ctx.health().await;

            println!("status:            {}", snapshot.status);
            println!("backend reachable: {}", snapshot.backend_reachable);
            println!("model:             {}", snapshot.model_name);
            println!("documents loaded:  {}", snapshot.documents_loaded);
            println!("active sessions:   {}", snapshot.active_sessions);

            if !snapshot.backend_reachable {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
