//! Explicit settings for the remote services used by one ingestion run.
//!
//! Nothing in the library reads the process environment; the binary builds these
//! values from its arguments and hands them to the components that need them.

use crate::ServiceError;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_MILVUS_ENDPOINT: &str = "http://localhost:19530";
pub const DEFAULT_COLLECTION: &str = "pdf_chunks";

/// Parses an endpoint so that relative joins append to its path instead of replacing
/// the last segment.
fn base_url(endpoint: &str) -> Result<Url, ServiceError> {
    let mut url = Url::parse(endpoint.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Truncates returned vectors server-side when set.
    pub output_dimensionality: Option<usize>,
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            output_dimensionality: None,
            timeout: None,
        }
    }

    pub fn batch_url(&self) -> Result<Url, ServiceError> {
        if self.api_key.trim().is_empty() {
            return Err(ServiceError::Request("missing Gemini API key".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ServiceError::Request("missing Gemini model name".to_string()));
        }

        let base = base_url(&self.endpoint)?;
        Ok(base.join(&format!(
            "v1beta/{}:batchEmbedContents",
            self.qualified_model()
        ))?)
    }

    /// Model name in the `models/<name>` form the API expects.
    pub fn qualified_model(&self) -> String {
        let model = self.model.trim();
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }
}

#[derive(Debug, Clone)]
pub struct MilvusConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub database: Option<String>,
    pub collection: String,
    pub timeout: Option<Duration>,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MILVUS_ENDPOINT.to_string(),
            token: None,
            database: None,
            collection: DEFAULT_COLLECTION.to_string(),
            timeout: None,
        }
    }
}

impl MilvusConfig {
    pub fn api_url(&self, operation: &str) -> Result<Url, ServiceError> {
        let base = base_url(&self.endpoint)?;
        Ok(base.join(&format!("v2/vectordb/{operation}"))?)
    }
}

#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub directory: PathBuf,
    pub collection: String,
}

impl LocalStoreConfig {
    pub fn new(directory: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            collection: collection.into(),
        }
    }

    pub fn collection_path(&self) -> Result<PathBuf, ServiceError> {
        let name = self.collection.trim();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(ServiceError::Request(format!(
                "invalid collection name: {:?}",
                self.collection
            )));
        }
        Ok(self.directory.join(format!("{name}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_url_uses_qualified_model() -> Result<(), ServiceError> {
        let mut config = GeminiConfig::new("key");
        config.model = "text-embedding-004".to_string();
        assert_eq!(
            config.batch_url()?.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/\
             text-embedding-004:batchEmbedContents"
        );

        config.model = "models/text-embedding-004".to_string();
        assert_eq!(config.qualified_model(), "models/text-embedding-004");
        Ok(())
    }

    #[test]
    fn gemini_requires_api_key() {
        let config = GeminiConfig::new("  ");
        assert!(matches!(config.batch_url(), Err(ServiceError::Request(_))));
    }

    #[test]
    fn milvus_urls_are_rooted_at_endpoint() -> Result<(), ServiceError> {
        let config = MilvusConfig::default();
        assert_eq!(
            config.api_url("collections/has")?.as_str(),
            "http://localhost:19530/v2/vectordb/collections/has"
        );
        Ok(())
    }

    #[test]
    fn endpoint_paths_are_kept_when_joining() -> Result<(), ServiceError> {
        let config = MilvusConfig {
            endpoint: "http://gw/milvus".to_string(),
            ..MilvusConfig::default()
        };
        assert_eq!(
            config.api_url("entities/insert")?.as_str(),
            "http://gw/milvus/v2/vectordb/entities/insert"
        );

        let config = MilvusConfig {
            endpoint: "http://gw/milvus/".to_string(),
            ..MilvusConfig::default()
        };
        assert_eq!(
            config.api_url("entities/insert")?.as_str(),
            "http://gw/milvus/v2/vectordb/entities/insert"
        );

        let mut gemini = GeminiConfig::new("key");
        gemini.endpoint = "https://proxy.example/google".to_string();
        assert_eq!(
            gemini.batch_url()?.as_str(),
            "https://proxy.example/google/v1beta/models/gemini-embedding-001:batchEmbedContents"
        );
        Ok(())
    }

    #[test]
    fn bad_milvus_endpoint_is_a_url_error() {
        let config = MilvusConfig {
            endpoint: "not a url".to_string(),
            ..MilvusConfig::default()
        };
        assert!(matches!(
            config.api_url("collections/has"),
            Err(ServiceError::Url(_))
        ));
    }

    #[test]
    fn local_collection_names_are_checked() -> Result<(), ServiceError> {
        let config = LocalStoreConfig::new("/tmp/store", "pdf_chunks");
        assert_eq!(
            config.collection_path()?,
            PathBuf::from("/tmp/store/pdf_chunks.json")
        );

        let escaping = LocalStoreConfig::new("/tmp/store", "../etc");
        assert!(escaping.collection_path().is_err());
        Ok(())
    }
}
