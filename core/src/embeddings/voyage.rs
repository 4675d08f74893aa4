//! Voyage AI embeddings provider.
//!
//! Voyage distinguishes document and query inputs; indexing goes through
//! `input_type: "document"` and single-query embedding through `"query"`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::Embedder;
use crate::embeddings::ProgressFn;
use crate::embeddings::normalize;
use crate::error::CtxErr;
use crate::error::Result;

const DEFAULT_MODEL: &str = "voyage-code-2";
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
/// Voyage caps batches at 128 inputs.
const BATCH_SIZE: usize = 128;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Voyage embeddings provider.
#[derive(Debug, Clone)]
pub struct VoyageEmbedder {
    api_key: String,
    model: String,
    dimensions: i32,
    base_url: String,
    client: reqwest::Client,
}

impl VoyageEmbedder {
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

    pub fn with_dimensions(mut self, dimensions: i32) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request_embeddings(
        &self,
        input: Vec<String>,
        input_type: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input,
            input_type: input_type.to_string(),
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
                    "voyage request throttled, backing off"
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
impl Embedder for VoyageEmbedder {
    fn name(&self) -> &str {
        "voyage"
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
            let embeddings = self.request_embeddings(batch.to_vec(), "document").await?;
            out.extend(embeddings);
            if let Some(progress) = &progress {
                progress(out.len(), texts.len());
            }
        }
        Ok(out)
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embeddings(vec![text.to_string()], "query")
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
    input_type: String,
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
        let embedder = VoyageEmbedder::new("k")
            .with_model("voyage-3")
            .with_dimensions(1024);
        assert_eq!(embedder.name(), "voyage");
        assert_eq!(embedder.dimensions(), 1024);
        assert_eq!(embedder.model, "voyage-3");
    }
}
