//! Local embeddings via fastembed (ONNX Runtime).
//!
//! No network, no keys. The first run downloads the model into the
//! fastembed cache directory.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::EmbeddingModel;
use fastembed::InitOptions;
use fastembed::TextEmbedding;

use crate::embeddings::Embedder;
use crate::embeddings::ProgressFn;
use crate::embeddings::normalize;
use crate::error::CtxErr;
use crate::error::Result;

/// Inputs per fastembed batch.
const BATCH_SIZE: usize = 64;

/// Local fastembed-backed embedder.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: i32,
}

impl LocalEmbedder {
    pub fn new(model_name: &str, dimensions: i32) -> Result<Self> {
        let model_kind = match model_name {
            "" | "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            other => {
                return Err(CtxErr::ConfigInvalid {
                    field: "embedder.model".to_string(),
                    cause: format!("unknown local model `{other}`"),
                });
            }
        };
        let model = TextEmbedding::try_new(InitOptions::new(model_kind)).map_err(|e| {
            CtxErr::EmbedderFailed {
                cause: format!("fastembed init: {e}"),
            }
        })?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: if model_name.is_empty() {
                "all-MiniLM-L6-v2".to_string()
            } else {
                model_name.to_string()
            },
            dimensions,
        })
    }

    fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let embeddings = model
            .embed(texts, None)
            .map_err(|e| CtxErr::EmbedderFailed {
                cause: format!("fastembed ({}): {e}", self.model_name),
            })?;
        Ok(embeddings
            .into_iter()
            .map(|mut v| {
                v.truncate(self.dimensions as usize);
                normalize(&mut v);
                v
            })
            .collect())
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
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
            let embeddings = self.embed_blocking(batch.to_vec())?;
            out.extend(embeddings);
            if let Some(progress) = &progress {
                progress(out.len(), texts.len());
            }
            // Inference is CPU-bound; yield between batches so the runtime
            // can make progress elsewhere.
            tokio::task::yield_now().await;
        }
        Ok(out)
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_blocking(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| CtxErr::EmbedderFailed {
                cause: "empty fastembed output".to_string(),
            })
    }
}
