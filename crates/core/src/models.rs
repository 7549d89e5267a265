use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Text extracted from one PDF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub text: String,
}

/// A window of a document's text, tagged with the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_file: String,
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    /// Deterministic id used by stores that do not generate their own.
    pub fn record_id(&self) -> String {
        format!("{}_chunk_{}", self.source_file, self.chunk_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Auto(i64),
    Named(String),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Auto(id) => write!(f, "{id}"),
            RecordId::Named(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub embedding: Vec<f32>,
    pub text: String,
    pub source: String,
}

/// Where a store call wrote its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub backend: String,
    pub collection: String,
    pub inserted: usize,
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
    pub collection: Option<CollectionHandle>,
    pub finished_at: DateTime<Utc>,
}
