use crate::config::MilvusConfig;
use crate::store::check_batch;
use crate::traits::VectorStore;
use crate::{Chunk, CollectionHandle, Document, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::info;

pub const TEXT_MAX_CHARS: usize = 2_000;
pub const SOURCE_MAX_CHARS: usize = 255;

const BACKEND: &str = "milvus";

/// Networked, schema-based store speaking the Milvus v2 REST API.
pub struct MilvusStore {
    config: MilvusConfig,
    client: Client,
}

impl MilvusStore {
    pub fn new(config: MilvusConfig) -> Result<Self, ServiceError> {
        config.api_url("collections/has")?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            config,
            client: builder.build()?,
        })
    }

    /// Creates the collection with the chunk schema unless it already exists.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<(), ServiceError> {
        let response = self
            .call("collections/has", self.collection_body())
            .await?;

        let exists = response
            .pointer("/data/has")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        let mut body = self.collection_body();
        if let Value::Object(fields) = collection_schema(dimension) {
            body.extend(fields);
        }
        self.call("collections/create", body).await?;

        info!(collection = %self.config.collection, dimension, "created milvus collection");
        Ok(())
    }

    pub async fn load_collection(&self) -> Result<(), ServiceError> {
        self.call("collections/load", self.collection_body())
            .await
            .map(|_| ())
    }

    fn collection_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(
            "collectionName".to_string(),
            Value::String(self.config.collection.clone()),
        );
        if let Some(database) = &self.config.database {
            body.insert("dbName".to_string(), Value::String(database.clone()));
        }
        body
    }

    async fn call(&self, operation: &str, body: Map<String, Value>) -> Result<Value, ServiceError> {
        let mut request = self
            .client
            .post(self.config.api_url(operation)?)
            .json(&Value::Object(body));

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{operation}: {}", response.status()),
            });
        }

        let payload: Value = response.json().await?;
        check_response_code(operation, payload)
    }
}

fn check_response_code(operation: &str, payload: Value) -> Result<Value, ServiceError> {
    let code = payload.pointer("/code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = payload
            .pointer("/message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(ServiceError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{operation}: code {code}: {message}"),
        });
    }
    Ok(payload)
}

fn collection_schema(dimension: usize) -> Value {
    json!({
        "schema": {
            "autoId": true,
            "enableDynamicField": false,
            "fields": [
                {"fieldName": "id", "dataType": "Int64", "isPrimary": true},
                {
                    "fieldName": "embedding",
                    "dataType": "FloatVector",
                    "elementTypeParams": {"dim": dimension.to_string()}
                },
                {
                    "fieldName": "text",
                    "dataType": "VarChar",
                    "elementTypeParams": {"max_length": TEXT_MAX_CHARS}
                },
                {
                    "fieldName": "source",
                    "dataType": "VarChar",
                    "elementTypeParams": {"max_length": SOURCE_MAX_CHARS}
                }
            ]
        },
        "indexParams": [
            {
                "fieldName": "embedding",
                "indexName": "embedding_index",
                "metricType": "L2",
                "indexType": "AUTOINDEX"
            }
        ]
    })
}

fn insert_rows(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<Vec<Value>, ServiceError> {
    chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| {
            let text_chars = chunk.text.chars().count();
            if text_chars > TEXT_MAX_CHARS {
                return Err(ServiceError::Request(format!(
                    "chunk {} has {text_chars} characters, the text field holds {TEXT_MAX_CHARS}",
                    chunk.record_id()
                )));
            }

            let source_chars = chunk.source_file.chars().count();
            if source_chars > SOURCE_MAX_CHARS {
                return Err(ServiceError::Request(format!(
                    "source name {} has {source_chars} characters, \
                     the source field holds {SOURCE_MAX_CHARS}",
                    chunk.source_file
                )));
            }

            Ok(json!({
                "embedding": embedding,
                "text": chunk.text,
                "source": chunk.source_file,
            }))
        })
        .collect()
}

#[async_trait]
impl VectorStore for MilvusStore {
    async fn store(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<CollectionHandle, ServiceError> {
        let handle = |inserted| CollectionHandle {
            backend: BACKEND.to_string(),
            collection: self.config.collection.clone(),
            inserted,
        };

        let Some(dimension) = check_batch(documents, chunks, embeddings)? else {
            return Ok(handle(0));
        };

        let rows = insert_rows(chunks, embeddings)?;

        self.ensure_collection(dimension).await?;

        let mut body = self.collection_body();
        body.insert("data".to_string(), Value::Array(rows));
        let response = self.call("entities/insert", body).await?;

        let inserted = response
            .pointer("/data/insertCount")
            .and_then(Value::as_u64)
            .map_or(chunks.len(), |count| count as usize);

        self.load_collection().await?;

        info!(
            collection = %self.config.collection,
            documents = documents.len(),
            inserted,
            "inserted chunks into milvus"
        );

        Ok(handle(inserted))
    }

    async fn count_records(&self) -> Result<u64, ServiceError> {
        let response = self
            .call("collections/get_stats", self.collection_body())
            .await?;

        response
            .pointer("/data/rowCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ServiceError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "collections/get_stats: missing rowCount".to_string(),
            })
    }
}
