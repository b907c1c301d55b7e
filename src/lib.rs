//! Asistente de preguntas y respuestas sobre un documento estructurado (RAG).
//!
//! Flujo: documento → chunks etiquetados por sección → embeddings → índice
//! vectorial persistente; y por cada pregunta: enriquecer → embedding →
//! vecinos más cercanos → contexto → respuesta.

pub mod chunker;
pub mod config;
pub mod docx;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod neo4j_client;
pub mod query_enhancer;
pub mod rag;
pub mod responder;
pub mod session;
pub mod vector_store;

pub use embedding::{Embedder, LocalHashEmbedder, OpenAiEmbedder};
pub use error::{QaError, Result};
pub use models::{Chunk, Document, IndexEntry, Paragraph};
pub use rag::{Retriever, CONTEXT_SEPARATOR};
pub use responder::{ExtractiveResponder, GenerativeResponder, KeywordResponder, Responder};
pub use session::{Session, SessionState};
pub use vector_store::{CollectionHandle, FileVectorIndex, Neo4jVectorIndex, OpenedCollection, VectorIndex};
