use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vecdb_setup_core::EmbeddingConfig;

use crate::error::EmbeddingError;
use crate::EmbeddingProvider;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for HttpEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl HttpEmbeddingProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmbeddingError::ClientInit(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(count = texts.len(), model = %self.model, "Requesting embeddings");

        let mut request = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EmbeddingError::HttpStatus { code: status.as_u16(), body });
        }

        let mut parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(EmbeddingError::JsonParse)?;
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                requested: texts.len(),
                returned: parsed.data.len(),
            });
        }
        parsed.data.sort_by_key(|d| d.index);

        parsed
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() == self.dimension {
                    Ok(d.embedding)
                } else {
                    Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimension,
                        actual: d.embedding.len(),
                    })
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
