mod config;

use arxrag_llm::LlmClient;
use arxrag_retrieval::{
    HttpEmbeddingClient, LlmQueryExpander, PgVectorStore, RetrievalEngine,
};
use arxrag_skills::{DocumentRetrieverSkill, SkillRegistry};
use clap::{Parser, Subcommand, ValueEnum};
use config::RagConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arxrag", about = "arxrag — multi-query retrieval over arXiv abstracts")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "arxrag.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve documents for a query and print them as JSON
    Retrieve {
        query: String,
    },
    /// Check database connectivity
    Ping,
    /// List registered skills
    Skills,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

struct App {
    store: Arc<PgVectorStore>,
    engine: Arc<RetrievalEngine>,
}

fn build(config: RagConfig) -> anyhow::Result<App> {
    let store = Arc::new(PgVectorStore::new(config.database, config.retry)?);
    let llm = Arc::new(LlmClient::new(config.model));
    let engine = Arc::new(RetrievalEngine::new(
        Arc::new(LlmQueryExpander::new(llm)),
        Arc::new(HttpEmbeddingClient::new(config.embedding)),
        store.clone(),
        config.retrieval,
    ));
    Ok(App { store, engine })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config = RagConfig::load(&config_str, |key| std::env::var(key).ok())?;
    let app = build(config)?;

    match cli.command {
        Commands::Retrieve { query } => {
            app.store.init().await?;
            let documents = app.engine.retrieve(&query).await;
            info!(total = documents.len(), "Retrieval finished");
            println!("{}", serde_json::to_string_pretty(&documents)?);
            app.store.close().await;
        }
        Commands::Ping => {
            let reachable = match app.store.init().await {
                Ok(()) => app.store.ping().await,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not initialize database pool");
                    false
                }
            };
            app.store.close().await;

            if reachable {
                println!("ok");
            } else {
                println!("unreachable");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Skills => {
            let mut registry = SkillRegistry::new();
            registry.register(Arc::new(DocumentRetrieverSkill::new(app.engine.clone())));

            let skills = registry.list_descriptors();
            println!("Registered skills:");
            for skill in &skills {
                println!("  {} — {}", skill.name, skill.description);
            }
            println!("\nTotal: {} skill(s)", skills.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}
