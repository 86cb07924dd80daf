use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragpipe::config::Config;
use ragpipe::embedder::Embedder;
use ragpipe::embedder::openai::OpenAiEmbedder;
use ragpipe::pipeline::{FailurePolicy, IngestOptions, IngestionPipeline};
use ragpipe::rerank::Reranker;
use ragpipe::retrieval::Retriever;
use ragpipe::store::{VectorStore, open_store};

#[derive(Parser)]
#[command(name = "ragpipe", version, about = "Document ingestion and vector retrieval")]
struct Cli {
    /// Path to the JSON config file (defaults to ./config.json)
    #[arg(long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and store a text file
    Ingest {
        /// File to ingest
        file: PathBuf,

        /// Document title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,

        /// Source URI recorded for the document (defaults to the file path)
        #[arg(long)]
        source: Option<String>,

        /// Keep going when a chunk fails instead of stopping at the first error
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Run a similarity query against the configured store
    Search {
        /// Query text
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score
        #[arg(long)]
        min_score: Option<f32>,

        /// Skip the LLM re-rank pass even when enabled in the config
        #[arg(long)]
        no_rerank: bool,
    },
    /// List ingested documents
    Docs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    // 1. Load and validate config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    // 2. Open the configured vector store
    let store: Arc<dyn VectorStore> = Arc::from(open_store(&config)?);

    match cli.command {
        Command::Ingest {
            file,
            title,
            source,
            continue_on_error,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });
            let source = source.unwrap_or_else(|| file.display().to_string());

            let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
                &config.embedding,
                &Config::openai_api_key()?,
            )?);
            let pipeline = IngestionPipeline::new(
                store,
                embedder,
                IngestOptions {
                    chunking: config.chunk_options(),
                    failure_policy: if continue_on_error {
                        FailurePolicy::Continue
                    } else {
                        FailurePolicy::Abort
                    },
                },
            );

            let report = pipeline.ingest(&title, &source, &text).await?;
            info!(
                document_id = report.document_id,
                written = report.chunks_written,
                total = report.chunks_total,
                "ingestion finished"
            );
            for failure in &report.failures {
                eprintln!("chunk {} failed: {}", failure.index, failure.error);
            }
            println!(
                "ingested {} ({}/{} chunks)",
                title, report.chunks_written, report.chunks_total
            );
        }

        Command::Search {
            query,
            top_k,
            min_score,
            no_rerank,
        } => {
            let api_key = Config::openai_api_key()?;
            let embedder: Arc<dyn Embedder> =
                Arc::new(OpenAiEmbedder::new(&config.embedding, &api_key)?);

            let mut retriever = Retriever::new(store, embedder);
            let use_rerank = config.rerank.enabled && !no_rerank;
            if use_rerank {
                retriever = retriever.with_reranker(Reranker::new(&config.rerank, &api_key)?);
            }

            let k = top_k.unwrap_or(config.search_top_k);
            let min_score = min_score.unwrap_or(config.min_score);
            let results = if use_rerank {
                retriever.retrieve_reranked(&query, k, min_score).await?
            } else {
                retriever.retrieve(&query, k, min_score).await?
            };

            if results.is_empty() {
                println!("no results");
            }
            for (rank, candidate) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    rank + 1,
                    candidate.score,
                    candidate.title,
                    candidate.source_url
                );
                println!("   {}", candidate.text);
            }
        }

        Command::Docs => {
            let documents = store.list_documents().await?;
            if documents.is_empty() {
                println!("no documents ingested");
            }
            for doc in documents {
                println!(
                    "{:>6}  {}  {}  ({})",
                    doc.id,
                    doc.created_at.format("%Y-%m-%d %H:%M"),
                    doc.title,
                    doc.source_uri
                );
            }
        }
    }

    Ok(())
}
