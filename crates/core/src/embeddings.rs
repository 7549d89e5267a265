use crate::config::GeminiConfig;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

#[async_trait]
pub trait Embedder {
    fn model_name(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;
}

/// Checks the count and dimensionality invariants shared by every embedder.
pub fn validate_embeddings(expected: usize, embeddings: &[Vec<f32>]) -> Result<(), ServiceError> {
    if embeddings.len() != expected {
        return Err(ServiceError::EmbeddingMismatch(format!(
            "received {} embeddings for {} inputs",
            embeddings.len(),
            expected
        )));
    }

    let Some(first) = embeddings.first() else {
        return Ok(());
    };

    if first.is_empty() {
        return Err(ServiceError::EmbeddingMismatch(
            "embedding vectors are empty".to_string(),
        ));
    }

    if let Some((index, vector)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != first.len())
    {
        return Err(ServiceError::EmbeddingMismatch(format!(
            "embedding {index} has dimension {} but the first has {}",
            vector.len(),
            first.len()
        )));
    }

    Ok(())
}

/// Deterministic hashed character-trigram vectors; needs no network.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "character-ngram"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Google Generative Language embeddings, one `batchEmbedContents` call per invocation.
pub struct GeminiEmbedder {
    config: GeminiConfig,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        config.batch_url()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            config,
            client: builder.build()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

fn build_batch_request<'a>(
    model: &'a str,
    texts: &'a [String],
    output_dimensionality: Option<usize>,
) -> BatchEmbedRequest<'a> {
    BatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| EmbedContentRequest {
                model,
                content: Content {
                    parts: [Part { text }],
                },
                task_type: "RETRIEVAL_DOCUMENT",
                output_dimensionality,
            })
            .collect(),
    }
}

fn response_to_vectors(
    response: BatchEmbedResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    let vectors: Vec<Vec<f32>> = response
        .embeddings
        .into_iter()
        .map(|embedding| embedding.values)
        .collect();
    validate_embeddings(expected, &vectors)?;
    Ok(vectors)
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.config.qualified_model();
        let payload = build_batch_request(&model, texts, self.config.output_dimensionality);

        let response = self
            .client
            .post(self.config.batch_url()?)
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::BackendResponse {
                backend: "gemini".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: BatchEmbedResponse = response.json().await?;
        let vectors = response_to_vectors(parsed, texts.len())?;

        info!(
            model = %self.config.model,
            inputs = texts.len(),
            dimensions = vectors.first().map_or(0, Vec::len),
            "embedded chunks"
        );

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BATCH_PATH: &str = "/v1beta/models/gemini-embedding-001:batchEmbedContents";

    fn embedder_for(server: &MockServer) -> Result<GeminiEmbedder, ServiceError> {
        GeminiEmbedder::new(GeminiConfig {
            endpoint: server.uri(),
            ..GeminiConfig::new("test-key")
        })
    }

    #[tokio::test]
    async fn gemini_sends_key_and_returns_vectors_in_order(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BATCH_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [
                    {"values": [0.1, 0.2]},
                    {"values": [0.3, 0.4]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let texts = vec!["pump".to_string(), "valve".to_string()];
        let vectors = embedder_for(&server)?.embed_documents(&texts).await?;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);

        let requests = server.received_requests().await.unwrap_or_default();
        let body: Value = serde_json::from_slice(&requests[0].body)?;
        assert_eq!(
            body.pointer("/requests/1/content/parts/0/text"),
            Some(&json!("valve"))
        );
        assert_eq!(
            body.pointer("/requests/0/taskType"),
            Some(&json!("RETRIEVAL_DOCUMENT"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn gemini_client_error_is_a_backend_response() -> Result<(), Box<dyn std::error::Error>>
    {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BATCH_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&server)
            .await;

        let result = embedder_for(&server)?
            .embed_documents(&["pump".to_string()])
            .await;

        match result {
            Err(ServiceError::BackendResponse { backend, details }) => {
                assert_eq!(backend, "gemini");
                assert!(details.contains("403"));
                assert!(details.contains("API key not valid"));
            }
            other => panic!("expected a backend response error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn gemini_skips_the_call_for_no_texts() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let vectors = embedder_for(&server)?.embed_documents(&[]).await?;
        assert!(vectors.is_empty());
        Ok(())
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn embed_documents_returns_one_vector_per_text() -> Result<(), ServiceError> {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let texts = vec![
            "abc".to_string(),
            String::new(),
            "a much longer chunk of text".to_string(),
        ];

        let vectors = embedder.embed_documents(&texts).await?;

        assert_eq!(vectors.len(), texts.len());
        assert!(vectors.iter().all(|vector| vector.len() == 32));
        validate_embeddings(texts.len(), &vectors)
    }

    #[test]
    fn validation_rejects_count_and_dimension_mismatches() {
        assert!(validate_embeddings(0, &[]).is_ok());
        assert!(matches!(
            validate_embeddings(2, &[vec![0.1, 0.2]]),
            Err(ServiceError::EmbeddingMismatch(_))
        ));
        assert!(matches!(
            validate_embeddings(2, &[vec![0.1, 0.2], vec![0.3]]),
            Err(ServiceError::EmbeddingMismatch(_))
        ));
        assert!(matches!(
            validate_embeddings(1, &[Vec::new()]),
            Err(ServiceError::EmbeddingMismatch(_))
        ));
    }

    #[test]
    fn batch_request_matches_api_shape() -> Result<(), serde_json::Error> {
        let texts = vec!["first".to_string(), "second".to_string()];
        let request = build_batch_request("models/gemini-embedding-001", &texts, Some(768));

        assert_eq!(
            serde_json::to_value(&request)?,
            json!({
                "requests": [
                    {
                        "model": "models/gemini-embedding-001",
                        "content": {"parts": [{"text": "first"}]},
                        "taskType": "RETRIEVAL_DOCUMENT",
                        "outputDimensionality": 768
                    },
                    {
                        "model": "models/gemini-embedding-001",
                        "content": {"parts": [{"text": "second"}]},
                        "taskType": "RETRIEVAL_DOCUMENT",
                        "outputDimensionality": 768
                    }
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn response_vectors_keep_input_order() -> Result<(), Box<dyn std::error::Error>> {
        let response: BatchEmbedResponse = serde_json::from_value(json!({
            "embeddings": [
                {"values": [0.1, 0.2, 0.3]},
                {"values": [0.4, 0.5, 0.6]}
            ]
        }))?;

        let vectors = response_to_vectors(response, 2)?;
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
        Ok(())
    }

    #[test]
    fn short_response_is_a_mismatch() -> Result<(), serde_json::Error> {
        let response: BatchEmbedResponse = serde_json::from_value(json!({
            "embeddings": [{"values": [0.1]}]
        }))?;

        assert!(matches!(
            response_to_vectors(response, 3),
            Err(ServiceError::EmbeddingMismatch(_))
        ));
        Ok(())
    }
}
