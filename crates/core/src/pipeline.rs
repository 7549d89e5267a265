use crate::chunking::{chunk_document, ChunkingConfig};
use crate::embeddings::{validate_embeddings, Embedder};
use crate::loader::load_path;
use crate::traits::VectorStore;
use crate::{Chunk, Document, PipelineError, RunSummary, ServiceError};
use chrono::Utc;
use std::path::Path;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Chunks paired positionally with their embeddings.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedChunks {
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

/// Chunks every document and embeds all chunks with a single embedder call.
pub async fn embed_stage<E>(
    embedder: &E,
    documents: &[Document],
    chunking: &ChunkingConfig,
) -> Result<EmbeddedChunks, ServiceError>
where
    E: Embedder + Sync + ?Sized,
{
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|document| chunk_document(document, chunking))
        .collect();

    if chunks.is_empty() {
        return Ok(EmbeddedChunks::default());
    }

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let embeddings = embedder.embed_documents(&texts).await?;
    validate_embeddings(chunks.len(), &embeddings)?;

    Ok(EmbeddedChunks { chunks, embeddings })
}

/// Loader, chunker, embedder and store wired into one forward pass.
pub struct IngestionPipeline<E, S> {
    embedder: E,
    store: S,
    chunking: ChunkingConfig,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(embedder: E, store: S, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            store,
            chunking,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self, folder: &Path) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, folder = %folder.display());
        self.run_inner(run_id, folder).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, folder: &Path) -> Result<RunSummary, PipelineError> {
        let report = load_path(folder)?;
        let skipped = report.skipped_files.len();
        let documents = report.documents;

        if documents.is_empty() {
            info!("no documents to ingest");
            return Ok(RunSummary {
                run_id,
                documents: 0,
                skipped,
                chunks: 0,
                collection: None,
                finished_at: Utc::now(),
            });
        }

        let embedded = embed_stage(&self.embedder, &documents, &self.chunking).await?;
        info!(
            model = self.embedder.model_name(),
            documents = documents.len(),
            chunks = embedded.chunks.len(),
            "chunked and embedded documents"
        );

        let handle = self
            .store
            .store(&documents, &embedded.chunks, &embedded.embeddings)
            .await?;

        Ok(RunSummary {
            run_id,
            documents: documents.len(),
            skipped,
            chunks: embedded.chunks.len(),
            collection: Some(handle),
            finished_at: Utc::now(),
        })
    }
}
