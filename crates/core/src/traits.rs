use crate::{Chunk, CollectionHandle, Document, ServiceError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore {
    /// Persists one record per chunk. `embeddings[i]` belongs to `chunks[i]`.
    async fn store(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<CollectionHandle, ServiceError>;

    async fn count_records(&self) -> Result<u64, ServiceError>;
}
