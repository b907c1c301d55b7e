//! Backends de embeddings: función pura texto → vector de dimensión fija.
//!
//! El núcleo sólo conoce el trait [`Embedder`]; la implementación concreta
//! (modelo local o API remota) se elige al construir la sesión.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{QaError, Result};

/// Un backend que convierte texto en embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Nombre corto del backend, usado en logs y errores.
    fn name(&self) -> &str;

    /// Dimensión de los vectores producidos.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Embeddings para varios textos; `result[i]` corresponde a `texts[i]`.
    ///
    /// Por defecto llama a [`Embedder::embed`] en orden.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------
// LOCAL
// ---------------------------------------------------------------------

/// Embedder local y determinista basado en hashing de tokens.
///
/// Cada token (alfanumérico, en minúsculas) suma ±1 en una posición derivada
/// de su hash FNV-1a; el vector resultante se normaliza (L2). El mismo texto
/// produce siempre el mismo vector, bit a bit.
#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn embed_sync(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0_f64; self.dimensions];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl Embedder for LocalHashEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        Ok(self.embed_sync(text))
    }
}

// ---------------------------------------------------------------------
// OPENAI (vía Rig)
// ---------------------------------------------------------------------

/// Dimensión de `text-embedding-ada-002` y `text-embedding-3-small`.
const OPENAI_DIMENSIONS: usize = 1536;

/// Dimensión de `text-embedding-3-large`.
const OPENAI_LARGE_DIMENSIONS: usize = 3072;

fn openai_dimensions(model: &str) -> usize {
    if model == "text-embedding-3-large" {
        OPENAI_LARGE_DIMENSIONS
    } else {
        OPENAI_DIMENSIONS
    }
}

/// Embedder remoto sobre la API de OpenAI usando Rig.
pub struct OpenAiEmbedder {
    client: rig::providers::openai::Client,
    model: String,
}

impl OpenAiEmbedder {
    /// Crea el cliente a partir de `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").map(|k| k.is_empty()).unwrap_or(true) {
            return Err(QaError::embedding("openai", "falta OPENAI_API_KEY en el entorno"));
        }
        let model = model.into();
        let model = if model.is_empty() {
            rig::providers::openai::TEXT_EMBEDDING_ADA_002.to_string()
        } else {
            model
        };
        Ok(Self { client: rig::providers::openai::Client::from_env(), model })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        openai_dimensions(&self.model)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.embed_many(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QaError::embedding("openai", "respuesta vacía de la API"))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        use rig::client::EmbeddingsClient as _;
        use rig::embeddings::EmbeddingModel as _;

        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(backend = "openai", model = %self.model, batch = texts.len(), "calculando embeddings");

        let embedding_model = self.client.embedding_model(&self.model);
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| QaError::embedding("openai", e))?;

        if embeddings.len() != texts.len() {
            return Err(QaError::embedding(
                "openai",
                format!(
                    "número de embeddings ({}) distinto al número de textos ({})",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }

        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn local_embeddings_are_deterministic_and_normalized() {
        let embedder = LocalHashEmbedder::new(64);
        let a = embedder.embed("iPhone 15 is $799").await.unwrap();
        let b = embedder.embed("iPhone 15 is $799").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn casing_and_punctuation_do_not_change_tokens() {
        let embedder = LocalHashEmbedder::new(128);
        let a = embedder.embed("iPhone price?").await.unwrap();
        let b = embedder.embed("iphone PRICE").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn related_texts_score_higher_than_unrelated() {
        let embedder = LocalHashEmbedder::new(384);
        let query = embedder.embed("iphone pricing").await.unwrap();
        let close = embedder.embed("Pricing: iPhone 15 is $799").await.unwrap();
        let far = embedder.embed("Support: visit the Genius Bar").await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn openai_dimensions_follow_the_model() {
        assert_eq!(openai_dimensions("text-embedding-ada-002"), 1536);
        assert_eq!(openai_dimensions("text-embedding-3-large"), 3072);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let embedder = LocalHashEmbedder::new(8);
        assert_eq!(embedder.embed("   ").await.unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn embed_many_preserves_order() {
        let embedder = LocalHashEmbedder::new(32);
        let texts = vec!["mac".to_string(), "watch".to_string(), "ipad".to_string()];
        let batch = tokio_test::block_on(embedder.embed_many(&texts)).unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &embedder.embed_sync(text));
        }
    }
}
