//! Recuperación de contexto para una pregunta.
//!
//! Flujo:
//!   1. Enriquecer la pregunta con palabras clave del dominio.
//!   2. Calcular el embedding de la pregunta enriquecida.
//!   3. Buscar los `top_k` chunks más cercanos en la colección.
//!   4. Concatenar los textos en orden de ranking con [`CONTEXT_SEPARATOR`].
//!
//! No hay reintentos: los errores de embeddings o del índice se propagan al
//! controlador de sesión.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    embedding::Embedder,
    error::Result,
    query_enhancer,
    vector_store::{CollectionHandle, VectorIndex},
};

/// Separador entre fragmentos del contexto ensamblado.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Número de fragmentos recuperados por defecto.
pub const DEFAULT_TOP_K: usize = 3;

/// Combina embedder, enriquecedor de consultas e índice vectorial.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    /// Contexto ensamblado para `raw_query`. Cadena vacía si no hay resultados.
    pub async fn retrieve(
        &self,
        raw_query: &str,
        index: &dyn VectorIndex,
        handle: &CollectionHandle,
    ) -> Result<String> {
        let enhanced = query_enhancer::enhance(raw_query);
        let embedding = self.embedder.embed(&enhanced).await?;
        let texts = index.query(handle, &embedding, self.top_k).await?;

        if texts.is_empty() {
            info!("Sin documentos relevantes para la consulta.");
            return Ok(String::new());
        }

        debug!(results = texts.len(), "documentos relevantes encontrados");
        Ok(texts.join(CONTEXT_SEPARATOR))
    }
}
