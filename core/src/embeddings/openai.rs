//! OpenAI embeddings provider.
//!
//! Uses the OpenAI Embeddings API with text-embedding-3-small by default.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::Embedder;
use crate::embeddings::ProgressFn;
use crate::embeddings::normalize;
use crate::error::CtxErr;
use crate::error::Result;

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Inputs per request.
const BATCH_SIZE: usize = 100;
/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Bounded retries on rate-limit and server errors.
const MAX_RETRIES: u32 = 3;

/// OpenAI embeddings provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dimensions: i32,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: 1536,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        if !model.is_empty() {
            self.model = model.to_string();
        }
        self
    }

    /// For text-embedding-3-small, valid values are 256, 512, 1024, 1536.
    pub fn with_dimensions(mut self, dimensions: i32) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One API call with bounded retries and exponential backoff on
    /// rate-limit signals.
    async fn request_embeddings(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input,
            dimensions: Some(self.dimensions),
            encoding_format: Some("float".to_string()),
        };

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await;

            let retriable = match &response {
                Ok(r) => {
                    let status = r.status();
                    status.as_u16() == 429 || status.is_server_error()
                }
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if retriable && attempt < MAX_RETRIES {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "embedding request throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let response = response.map_err(|e| CtxErr::EmbedderFailed {
                cause: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CtxErr::EmbedderFailed {
                    cause: format!("API error {status}: {body}"),
                });
            }

            let result: EmbeddingResponse =
                response.json().await.map_err(|e| CtxErr::EmbedderFailed {
                    cause: e.to_string(),
                })?;

            // Sort by index so output order matches input order.
            let mut embeddings: Vec<(i32, Vec<f32>)> = result
                .data
                .into_iter()
                .map(|e| (e.index, e.embedding))
                .collect();
            embeddings.sort_by_key(|(index, _)| *index);

            return Ok(embeddings
                .into_iter()
                .map(|(_, mut v)| {
                    normalize(&mut v);
                    v
                })
                .collect());
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    async fn embed(
        &self,
        texts: &[String],
        progress: Option<ProgressFn>,
    ) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request_embeddings(batch.to_vec()).await?;
            out.extend(embeddings);
            if let Some(progress) = &progress {
                progress(out.len(), texts.len());
            }
        }
        Ok(out)
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embeddings(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CtxErr::EmbedderFailed {
                cause: "empty response".to_string(),
            })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: i32,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let embedder = OpenAiEmbedder::new("test-key")
            .with_model("text-embedding-3-large")
            .with_dimensions(1024)
            .with_base_url("https://proxy.internal/v1");
        assert_eq!(embedder.name(), "openai");
        assert_eq!(embedder.dimensions(), 1024);
        assert_eq!(embedder.model, "text-embedding-3-large");
        assert_eq!(embedder.base_url, "https://proxy.internal/v1");
    }

    #[test]
    fn test_empty_model_keeps_default() {
        let embedder = OpenAiEmbedder::new("k").with_model("");
        assert_eq!(embedder.model, DEFAULT_MODEL);
    }
}
