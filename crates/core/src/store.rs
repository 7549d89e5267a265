use crate::{Chunk, Document, ServiceError};
use std::collections::HashSet;

/// Checks that a batch is internally consistent before anything is written.
///
/// Returns the embedding dimensionality, or `None` for an empty batch.
pub fn check_batch(
    documents: &[Document],
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
) -> Result<Option<usize>, ServiceError> {
    if chunks.len() != embeddings.len() {
        return Err(ServiceError::EmbeddingMismatch(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    let known: HashSet<&str> = documents
        .iter()
        .map(|document| document.file_name.as_str())
        .collect();
    if let Some(orphan) = chunks
        .iter()
        .find(|chunk| !known.contains(chunk.source_file.as_str()))
    {
        return Err(ServiceError::Request(format!(
            "chunk {} refers to a document that is not part of this batch",
            orphan.record_id()
        )));
    }

    let dimension = embeddings.first().map(Vec::len);
    if let Some(expected) = dimension {
        if let Some(vector) = embeddings.iter().find(|vector| vector.len() != expected) {
            return Err(ServiceError::EmbeddingMismatch(format!(
                "embedding dimension {} != {}",
                vector.len(),
                expected
            )));
        }
    }

    Ok(dimension)
}
