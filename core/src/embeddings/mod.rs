//! Embedder contract and provider wiring.
//!
//! The core owns the contract only: implementations are selected through
//! an [`EmbedderFactory`] so callers can substitute their own. Providers
//! are cached per `(project, provider, model, dimensions)` for the
//! process lifetime.

mod openai;
mod voyage;

#[cfg(feature = "local-embeddings")]
mod local;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::config::EmbedderConfig;
use crate::error::CtxErr;
use crate::error::Result;

pub use openai::OpenAiEmbedder;
pub use voyage::VoyageEmbedder;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

/// Progress callback: `(done, total)` after each batch.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Pluggable vector embedder.
///
/// Contract: outputs are L2-normalized, exactly `dimensions()` wide, and
/// ordered to match the inputs. `embed` is the indexing path; `embed_single`
/// is the query path (providers may use a query-specific mode internally).
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> i32;

    async fn embed(&self, texts: &[String], progress: Option<ProgressFn>)
    -> Result<Vec<Vec<f32>>>;

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>>;
}

/// Constructs embedders from configuration.
pub trait EmbedderFactory: Send + Sync {
    fn create(&self, config: &EmbedderConfig) -> Result<Arc<dyn Embedder>>;
}

/// Default factory covering the built-in providers.
///
/// API keys come from the environment: `CTX_OPENAI_KEY`, `CTX_VOYAGE_KEY`.
pub struct DefaultEmbedderFactory;

impl EmbedderFactory for DefaultEmbedderFactory {
    fn create(&self, config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
        match config.provider.as_str() {
            "openai" => {
                let key = std::env::var("CTX_OPENAI_KEY").map_err(|_| CtxErr::ConfigInvalid {
                    field: "embedder.provider".to_string(),
                    cause: "CTX_OPENAI_KEY is not set".to_string(),
                })?;
                Ok(Arc::new(
                    OpenAiEmbedder::new(key)
                        .with_model(&config.model)
                        .with_dimensions(config.dimensions),
                ))
            }
            "voyage" => {
                let key = std::env::var("CTX_VOYAGE_KEY").map_err(|_| CtxErr::ConfigInvalid {
                    field: "embedder.provider".to_string(),
                    cause: "CTX_VOYAGE_KEY is not set".to_string(),
                })?;
                Ok(Arc::new(
                    VoyageEmbedder::new(key)
                        .with_model(&config.model)
                        .with_dimensions(config.dimensions),
                ))
            }
            #[cfg(feature = "local-embeddings")]
            "local" => Ok(Arc::new(LocalEmbedder::new(
                &config.model,
                config.dimensions,
            )?)),
            #[cfg(not(feature = "local-embeddings"))]
            "local" => Err(CtxErr::ConfigInvalid {
                field: "embedder.provider".to_string(),
                cause: "built without the `local-embeddings` feature".to_string(),
            }),
            other => Err(CtxErr::ConfigInvalid {
                field: "embedder.provider".to_string(),
                cause: format!("unknown provider `{other}`"),
            }),
        }
    }
}

/// Process-wide embedder cache.
static EMBEDDERS: Lazy<Mutex<HashMap<String, Arc<dyn Embedder>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Get or create the embedder for a project.
///
/// Cached by `(project, provider, model, dimensions)`; a config change
/// atomically replaces the cached instance.
pub fn cached_embedder(
    project: &Path,
    config: &EmbedderConfig,
    factory: &dyn EmbedderFactory,
) -> Result<Arc<dyn Embedder>> {
    let key = format!("{}|{}", project.display(), config.signature());
    let mut cache = EMBEDDERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(embedder) = cache.get(&key) {
        return Ok(Arc::clone(embedder));
    }
    let embedder = factory.create(config)?;
    // One project holds at most one live embedder: drop stale signatures.
    let prefix = format!("{}|", project.display());
    cache.retain(|k, _| !k.starts_with(&prefix));
    cache.insert(key, Arc::clone(&embedder));
    Ok(embedder)
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_is_idempotent() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let once = v.clone();
        normalize(&mut v);
        for (a, b) in v.iter().zip(once.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_leaves_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let v = vec![0.2, 0.5, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = EmbedderConfig {
            provider: "skynet".to_string(),
            model: "m".to_string(),
            dimensions: 8,
        };
        assert!(DefaultEmbedderFactory.create(&config).is_err());
    }
}
