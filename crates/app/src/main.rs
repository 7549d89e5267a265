use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_ingest_core::{
    CharacterNgramEmbedder, ChunkingConfig, Embedder, GeminiConfig, GeminiEmbedder,
    IngestionPipeline, LocalStore, LocalStoreConfig, MemoryStore, MilvusConfig, MilvusStore,
    VectorStore,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Which vector store receives the chunks.
    #[arg(long, value_enum, default_value_t = StoreKind::Milvus)]
    store: StoreKind,

    /// Collection name in the selected store.
    #[arg(long, env = "PDF_INGEST_COLLECTION", default_value = "pdf_chunks")]
    collection: String,

    /// Milvus base URL
    #[arg(long, env = "MILVUS_URI", default_value = "http://localhost:19530")]
    milvus_url: String,

    /// Milvus token (`user:password` or API key)
    #[arg(long, env = "MILVUS_TOKEN", hide_env_values = true)]
    milvus_token: Option<String>,

    /// Milvus database name
    #[arg(long, env = "MILVUS_DB")]
    milvus_db: Option<String>,

    /// Directory holding local collections
    #[arg(long, env = "PDF_INGEST_LOCAL_DIR", default_value = "./vector_db")]
    local_dir: PathBuf,

    /// Google API key for the embedding model
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Gemini embedding model
    #[arg(long, env = "GEMINI_EMBEDDING_MODEL", default_value = "gemini-embedding-001")]
    embedding_model: String,

    /// Requested embedding dimensionality; the model default when omitted.
    #[arg(long)]
    embedding_dimensions: Option<usize>,

    /// Request timeout in seconds for remote services.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    /// Schema-based Milvus collection.
    Milvus,
    /// Embedded collection stored as JSON on disk.
    Local,
    /// Throwaway in-process collection (dry run).
    Memory,
}

#[derive(Subcommand)]
enum Command {
    /// Load PDFs from a folder, chunk, embed, and store them.
    Ingest {
        /// Folder that directly contains the PDFs.
        #[arg(long, default_value = "./data")]
        folder: PathBuf,
        /// Characters per chunk.
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        /// Characters shared by consecutive chunks.
        #[arg(long, default_value = "200")]
        overlap: usize,
        /// Use the local hashing embedder instead of the remote model.
        #[arg(long, default_value_t = false)]
        offline_embeddings: bool,
    },
    /// Print the number of records in the collection.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-ingest boot"
    );

    match &cli.command {
        Command::Ingest {
            folder,
            chunk_size,
            overlap,
            offline_embeddings,
        } => {
            let chunking = ChunkingConfig::new(*chunk_size, *overlap)?;
            let job = IngestJob {
                cli: &cli,
                folder,
                chunking,
                offline: *offline_embeddings,
            };

            match cli.store {
                StoreKind::Milvus => job.run(MilvusStore::new(milvus_config(&cli))?).await?,
                StoreKind::Local => job.run(LocalStore::open(local_config(&cli)).await?).await?,
                StoreKind::Memory => job.run(MemoryStore::new(&cli.collection)).await?,
            }
        }
        Command::Stats => {
            let count = match cli.store {
                StoreKind::Milvus => MilvusStore::new(milvus_config(&cli))?.count_records().await?,
                StoreKind::Local => {
                    LocalStore::open(local_config(&cli))
                        .await?
                        .count_records()
                        .await?
                }
                StoreKind::Memory => anyhow::bail!("the memory store keeps nothing between runs"),
            };
            println!("collection={} records={count}", cli.collection);
        }
    }

    Ok(())
}

struct IngestJob<'a> {
    cli: &'a Cli,
    folder: &'a Path,
    chunking: ChunkingConfig,
    offline: bool,
}

impl IngestJob<'_> {
    async fn run<S>(&self, store: S) -> anyhow::Result<()>
    where
        S: VectorStore + Send + Sync,
    {
        if self.offline {
            return self.run_with(CharacterNgramEmbedder::default(), store).await;
        }

        let api_key = self.cli.google_api_key.clone().context(
            "GOOGLE_API_KEY is not set (pass --offline-embeddings to skip the remote model)",
        )?;
        let config = GeminiConfig {
            model: self.cli.embedding_model.clone(),
            output_dimensionality: self.cli.embedding_dimensions,
            timeout: timeout(self.cli),
            ..GeminiConfig::new(api_key)
        };
        self.run_with(GeminiEmbedder::new(config)?, store).await
    }

    async fn run_with<E, S>(&self, embedder: E, store: S) -> anyhow::Result<()>
    where
        E: Embedder + Send + Sync,
        S: VectorStore + Send + Sync,
    {
        println!("Loading PDFs from {}...", self.folder.display());

        let pipeline = IngestionPipeline::new(embedder, store, self.chunking);
        let summary = pipeline
            .run(self.folder)
            .await
            .with_context(|| format!("ingestion of {} failed", self.folder.display()))?;

        if summary.skipped > 0 {
            println!("Skipped {} unreadable PDF(s).", summary.skipped);
        }

        let Some(handle) = summary.collection else {
            println!("No documents found in {}.", self.folder.display());
            return Ok(());
        };

        println!("Found {} documents.", summary.documents);
        println!("Generated {} chunks and embeddings.", summary.chunks);
        println!(
            "Stored {} records in {}/{} (run {}) at {}",
            handle.inserted,
            handle.backend,
            handle.collection,
            summary.run_id,
            summary.finished_at.to_rfc3339()
        );
        Ok(())
    }
}

fn timeout(cli: &Cli) -> Option<Duration> {
    cli.timeout_secs.map(Duration::from_secs)
}

fn milvus_config(cli: &Cli) -> MilvusConfig {
    MilvusConfig {
        endpoint: cli.milvus_url.clone(),
        token: cli.milvus_token.clone(),
        database: cli.milvus_db.clone(),
        collection: cli.collection.clone(),
        timeout: timeout(cli),
    }
}

fn local_config(cli: &Cli) -> LocalStoreConfig {
    LocalStoreConfig::new(&cli.local_dir, &cli.collection)
}
