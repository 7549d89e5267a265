pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_document, chunk_text, ChunkingConfig};
pub use config::{GeminiConfig, LocalStoreConfig, MilvusConfig};
pub use embeddings::{
    validate_embeddings, CharacterNgramEmbedder, Embedder, GeminiEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, PipelineError, ServiceError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use loader::{discover_pdf_files, load_path, load_path_with};
pub use models::{
    Chunk, CollectionHandle, Document, LoadReport, RecordId, RunSummary, SkippedPdf,
    StoredRecord,
};
pub use pipeline::{embed_stage, EmbeddedChunks, IngestionPipeline};
pub use stores::{LocalStore, MemoryStore, MilvusStore};
pub use traits::VectorStore;
