//! Taxonomía de errores del núcleo de recuperación y respuesta.

use thiserror::Error;

/// Errores que pueden producirse en el pipeline de preguntas y respuestas.
#[derive(Debug, Error)]
pub enum QaError {
    /// El documento no se pudo leer o interpretar. Fatal en el arranque.
    #[error("Error cargando el documento ({path}): {message}")]
    DocumentLoad { path: String, message: String },

    /// El backend de embeddings no responde o rechaza la entrada.
    #[error("Error del backend de embeddings ({backend}): {message}")]
    EmbeddingBackend { backend: String, message: String },

    /// El índice vectorial no se pudo abrir o consultar.
    #[error("Índice vectorial no disponible ({backend}): {message}")]
    IndexUnavailable { backend: String, message: String },

    /// El backend de generación falló al completar la respuesta.
    #[error("Error del backend de generación ({backend}): {message}")]
    GenerationBackend { backend: String, message: String },
}

impl QaError {
    pub(crate) fn document(path: impl Into<String>, message: impl ToString) -> Self {
        Self::DocumentLoad { path: path.into(), message: message.to_string() }
    }

    pub(crate) fn embedding(backend: &str, message: impl ToString) -> Self {
        Self::EmbeddingBackend { backend: backend.to_string(), message: message.to_string() }
    }

    pub(crate) fn index(backend: &str, message: impl ToString) -> Self {
        Self::IndexUnavailable { backend: backend.to_string(), message: message.to_string() }
    }

    pub(crate) fn generation(backend: &str, message: impl ToString) -> Self {
        Self::GenerationBackend { backend: backend.to_string(), message: message.to_string() }
    }
}

/// Alias de resultado para las operaciones del núcleo.
pub type Result<T> = std::result::Result<T, QaError>;
