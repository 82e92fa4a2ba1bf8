use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use faq_router::api;
use faq_router::config::Config;
use faq_router::ingest::EmbedMode;
use faq_router::models::AskResponse;
use faq_router::state::AppState;

#[derive(Parser)]
#[command(name = "faq-router")]
#[command(about = "Answer questions from a FAQ corpus, falling back to an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Load FAQ entries from a JSON file of {question, answer} objects
    Load {
        file: PathBuf,
    },
    /// Compute embeddings and rebuild the vector index
    Embed {
        /// Re-embed every entry instead of only the missing ones
        #[arg(long)]
        full: bool,
    },
    /// Answer a single question and print the result as JSON
    Ask {
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.validate()?;
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Index backend: {}", config.index_backend.as_str());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone()).await?;

    match cli.command {
        Command::Serve => {
            state.prepare_index().await?;
            let app = api::routes(state);

            let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
            tracing::info!("Server listening on {}", config.bind_addr);
            axum::serve(listener, app).await?;
        }
        Command::Load { file } => {
            let report = state.indexer.load_file(&file).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Embed { full } => {
            let mode = if full { EmbedMode::Full } else { EmbedMode::Incremental };
            let report = state.indexer.embed(mode).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Ask { question } => {
            state.prepare_index().await?;
            let answer = state.router.resolve(&question).await?;
            let response = AskResponse::new(question.trim().to_string(), answer);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
