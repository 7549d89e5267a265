use crate::config::LocalStoreConfig;
use crate::store::check_batch;
use crate::traits::VectorStore;
use crate::{Chunk, CollectionHandle, Document, RecordId, ServiceError, StoredRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

const BACKEND: &str = "local";

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    dimension: Option<usize>,
    created_at: DateTime<Utc>,
    records: Vec<StoredRecord>,
}

impl CollectionFile {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dimension: None,
            created_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Adds a record unless its id is already taken. Returns whether it was added.
    fn add(
        &mut self,
        ids: &mut HashSet<String>,
        record: StoredRecord,
    ) -> Result<bool, ServiceError> {
        match self.dimension {
            Some(dimension) if dimension != record.embedding.len() => {
                return Err(ServiceError::EmbeddingMismatch(format!(
                    "collection {} holds {dimension}-dimensional vectors, got {}",
                    self.name,
                    record.embedding.len()
                )));
            }
            Some(_) => {}
            None => self.dimension = Some(record.embedding.len()),
        }

        if !ids.insert(record.id.to_string()) {
            warn!(collection = %self.name, id = %record.id, "record id already exists, skipping");
            return Ok(false);
        }

        self.records.push(record);
        Ok(true)
    }
}

/// Embedded store persisted as one JSON file per collection.
///
/// Record ids are `"{file_name}_chunk_{index}"`, so ingesting the same file twice
/// collides with the earlier records instead of duplicating them.
pub struct LocalStore {
    path: PathBuf,
    collection: String,
    state: Mutex<CollectionFile>,
}

impl LocalStore {
    /// Opens the named collection, creating the directory and file when absent.
    pub async fn open(config: LocalStoreConfig) -> Result<Self, ServiceError> {
        let path = config.collection_path()?;
        let collection = config.collection.trim().to_string();

        let state = if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice::<CollectionFile>(&bytes)?
        } else {
            tokio::fs::create_dir_all(&config.directory).await?;
            let created = CollectionFile::new(&collection);
            write_collection(&path, &created).await?;
            info!(path = %path.display(), "created local collection");
            created
        };

        Ok(Self {
            path,
            collection,
            state: Mutex::new(state),
        })
    }

    pub async fn records(&self) -> Vec<StoredRecord> {
        self.state.lock().await.records.clone()
    }
}

async fn write_collection(path: &Path, collection: &CollectionFile) -> Result<(), ServiceError> {
    let bytes = serde_json::to_vec(collection)?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn store(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<CollectionHandle, ServiceError> {
        check_batch(documents, chunks, embeddings)?;

        let mut state = self.state.lock().await;
        let mut ids: HashSet<String> = state
            .records
            .iter()
            .map(|record| record.id.to_string())
            .collect();

        let committed_len = state.records.len();
        let committed_dimension = state.dimension;

        let mut inserted = 0;
        let mut outcome = Ok(());
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let record = StoredRecord {
                id: RecordId::Named(chunk.record_id()),
                embedding: embedding.clone(),
                text: chunk.text.clone(),
                source: chunk.source_file.clone(),
            };
            match state.add(&mut ids, record) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }

        if outcome.is_ok() && inserted > 0 {
            outcome = write_collection(&self.path, &state).await;
        }

        // Memory must only hold what reached disk.
        if let Err(error) = outcome {
            state.records.truncate(committed_len);
            state.dimension = committed_dimension;
            return Err(error);
        }

        info!(
            collection = %self.collection,
            documents = documents.len(),
            inserted,
            skipped = chunks.len() - inserted,
            "stored chunks locally"
        );

        Ok(CollectionHandle {
            backend: BACKEND.to_string(),
            collection: self.collection.clone(),
            inserted,
        })
    }

    async fn count_records(&self) -> Result<u64, ServiceError> {
        Ok(self.state.lock().await.records.len() as u64)
    }
}
