use crate::store::check_batch;
use crate::traits::VectorStore;
use crate::{Chunk, CollectionHandle, Document, RecordId, ServiceError, StoredRecord};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

const BACKEND: &str = "memory";

/// In-process, append-only store with auto-increment ids. Nothing outlives the value.
pub struct MemoryStore {
    collection: String,
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn store(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<CollectionHandle, ServiceError> {
        check_batch(documents, chunks, embeddings)?;

        let mut records = self.records.lock().await;
        if let (Some(existing), Some(incoming)) = (records.first(), embeddings.first()) {
            if existing.embedding.len() != incoming.len() {
                return Err(ServiceError::EmbeddingMismatch(format!(
                    "collection {} holds {}-dimensional vectors, got {}",
                    self.collection,
                    existing.embedding.len(),
                    incoming.len()
                )));
            }
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let id = RecordId::Auto(records.len() as i64 + 1);
            records.push(StoredRecord {
                id,
                embedding: embedding.clone(),
                text: chunk.text.clone(),
                source: chunk.source_file.clone(),
            });
        }

        info!(collection = %self.collection, inserted = chunks.len(), "stored chunks in memory");

        Ok(CollectionHandle {
            backend: BACKEND.to_string(),
            collection: self.collection.clone(),
            inserted: chunks.len(),
        })
    }

    async fn count_records(&self) -> Result<u64, ServiceError> {
        Ok(self.records.lock().await.len() as u64)
    }
}
