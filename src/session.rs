//! Controlador de sesión: construcción única del índice y bucle
//! pregunta → enriquecer → embedding → recuperar → responder.
//!
//! Estados: `Initializing → Ready → (AwaitingInput ⇄ Processing) → Terminated`.
//! El bucle es secuencial: una pregunta se procesa por completo antes de leer
//! la siguiente.

use std::{future::Future, sync::Arc};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::{
    chunker,
    embedding::Embedder,
    error::{QaError, Result},
    models::{Chunk, Document, IndexEntry},
    rag::Retriever,
    responder::Responder,
    vector_store::{CollectionHandle, VectorIndex},
};

/// Palabras que terminan la sesión (sin distinguir mayúsculas).
pub const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

pub const PROMPT: &str = "You: ";
pub const ASSISTANT_PREFIX: &str = "Customer assistant: ";
pub const FAREWELL_MESSAGE: &str = "Thank you! Have a great day!";
pub const INTERRUPTED_MESSAGE: &str = "Session interrupted. Goodbye!";
pub const EMPTY_INPUT_REMINDER: &str = "Please enter a question about Apple products.";
pub const RETRY_HINT: &str = "Please try asking your question again.";

/// Cada cuántos chunks se registra el progreso de la indexación.
const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Ready,
    AwaitingInput,
    Processing,
    Terminated,
}

/// Resumen de la construcción del índice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub chunks: usize,
    pub embedded: usize,
    /// `true` si la colección ya tenía entradas y no se re-embebió nada.
    pub reused: bool,
    pub entries: usize,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reused {
            write!(f, "Colección reutilizada con {} entradas ({} chunks en el documento).", self.entries, self.chunks)
        } else {
            write!(f, "Índice construido: {} chunks embebidos, {} entradas.", self.embedded, self.entries)
        }
    }
}

pub fn is_exit_token(input: &str) -> bool {
    let input = input.trim();
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// La colección reutilizada debe tener la dimensión del embedder activo.
async fn check_dimensions(embedder: &dyn Embedder, index: &dyn VectorIndex, handle: &CollectionHandle) -> Result<()> {
    match index.dimensions(handle).await? {
        Some(stored) if stored != embedder.dimensions() => Err(QaError::index(
            index.backend(),
            format!(
                "la colección '{}' tiene dimensión {} y el embedder '{}' produce {}; vacíala para reconstruirla",
                handle.name(),
                stored,
                embedder.name(),
                embedder.dimensions()
            ),
        )),
        _ => Ok(()),
    }
}

/// Construye el índice de la colección a partir de `chunks`.
///
/// Si la colección ya contiene entradas no hace nada (construcción idempotente).
/// Todos los embeddings se calculan antes de escribir; si la escritura falla a
/// mitad, la colección se vacía para que el siguiente arranque la reconstruya.
pub async fn build_index(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    handle: &CollectionHandle,
    chunks: &[Chunk],
) -> Result<BuildSummary> {
    let existing = index.count(handle).await?;
    if existing > 0 {
        check_dimensions(embedder, index, handle).await?;
        info!("La colección '{}' ya contiene {} documentos.", handle.name(), existing);
        return Ok(BuildSummary { chunks: chunks.len(), embedded: 0, reused: true, entries: existing });
    }

    info!("Creando embeddings para {} chunks...", chunks.len());
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(PROGRESS_EVERY) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_many(&texts).await?;
        entries.extend(batch.iter().zip(vectors).map(|(chunk, embedding)| IndexEntry {
            id: chunk.id.clone(),
            embedding,
            text: chunk.text.clone(),
        }));
        if entries.len() % PROGRESS_EVERY == 0 {
            info!("  Procesados {}/{} chunks...", entries.len(), chunks.len());
        }
    }

    if let Err(e) = index.upsert_many(handle, &entries).await {
        warn!("Fallo al escribir el índice ({e}); se vacía la colección '{}'.", handle.name());
        if let Err(clear_err) = index.clear(handle).await {
            error!("No se pudo vaciar la colección '{}': {clear_err}", handle.name());
        }
        return Err(e);
    }

    let entries = index.count(handle).await?;
    info!("Índice construido correctamente.");
    Ok(BuildSummary { chunks: chunks.len(), embedded: chunks.len(), reused: false, entries })
}

/// Sesión de preguntas y respuestas sobre un documento.
pub struct Session {
    state: SessionState,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    handle: Option<CollectionHandle>,
    retriever: Retriever,
    responder: Arc<dyn Responder>,
}

impl Session {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        responder: Arc<dyn Responder>,
        top_k: usize,
    ) -> Self {
        let retriever = Retriever::new(embedder.clone(), top_k);
        Self { state: SessionState::Initializing, embedder, index, handle: None, retriever, responder }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&CollectionHandle> {
        self.handle.as_ref()
    }

    /// Trocea el documento y construye (o reutiliza) la colección.
    /// Cualquier error deja la sesión en `Terminated`.
    pub async fn initialize(&mut self, document: &Document, collection: &str) -> Result<BuildSummary> {
        self.state = SessionState::Initializing;
        match self.try_initialize(document, collection).await {
            Ok(summary) => {
                self.state = SessionState::Ready;
                info!("{summary}");
                Ok(summary)
            }
            Err(e) => {
                error!("Error inicializando la sesión: {e}");
                self.terminate();
                Err(e)
            }
        }
    }

    async fn try_initialize(&mut self, document: &Document, collection: &str) -> Result<BuildSummary> {
        let chunks = chunker::chunk(document);
        info!("✓ {} chunks extraídos de {}", chunks.len(), document.source);

        let opened = self.index.open_or_create(collection).await?;
        let summary = build_index(self.embedder.as_ref(), self.index.as_ref(), &opened.handle, &chunks).await?;
        self.handle = Some(opened.handle);
        Ok(summary)
    }

    /// Procesa una pregunta: recuperar contexto y componer la respuesta.
    ///
    /// Si el índice falla en mitad de la sesión se continúa con contexto vacío.
    pub async fn answer(&mut self, raw_query: &str) -> Result<String> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| QaError::index(self.index.backend(), "la sesión no tiene una colección abierta"))?;

        self.state = SessionState::Processing;
        let context = match self.retriever.retrieve(raw_query, self.index.as_ref(), &handle).await {
            Ok(context) => context,
            Err(QaError::IndexUnavailable { backend, message }) => {
                warn!("Índice no disponible ({backend}): {message}. Se continúa sin contexto.");
                String::new()
            }
            Err(e) => return Err(e),
        };
        self.responder.respond(&context, raw_query).await
    }

    /// Bucle interactivo sobre un flujo de líneas.
    ///
    /// Termina con una palabra de salida, con fin de entrada o cuando
    /// `interrupt` se completa (Ctrl+C en el binario).
    pub async fn run<R, W, F>(&mut self, reader: R, mut writer: W, interrupt: F) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let mut reader = reader;
        tokio::pin!(interrupt);

        writer
            .write_all(
                format!(
                    "Customer service assistant ready! Ask product-related questions.\nType '{}' to end the session.\n",
                    EXIT_WORDS.join("', '")
                )
                .as_bytes(),
            )
            .await?;

        loop {
            self.state = SessionState::AwaitingInput;
            writer.write_all(format!("\n{PROMPT}").as_bytes()).await?;
            writer.flush().await?;

            let mut line = String::new();
            let read = tokio::select! {
                read = reader.read_line(&mut line) => read?,
                _ = &mut interrupt => {
                    writer.write_all(format!("\n{ASSISTANT_PREFIX}{INTERRUPTED_MESSAGE}\n").as_bytes()).await?;
                    break;
                }
            };

            let input = line.trim();
            if read == 0 || is_exit_token(input) {
                writer.write_all(format!("\n{ASSISTANT_PREFIX}{FAREWELL_MESSAGE}\n").as_bytes()).await?;
                break;
            }
            if input.is_empty() {
                writer.write_all(format!("{EMPTY_INPUT_REMINDER}\n").as_bytes()).await?;
                continue;
            }

            match self.answer(input).await {
                Ok(answer) => {
                    writer.write_all(format!("\n{ASSISTANT_PREFIX}{answer}\n").as_bytes()).await?;
                }
                Err(e) => {
                    error!("Error procesando la consulta: {e}");
                    writer.write_all(format!("\nError: {e}\n{RETRY_HINT}\n").as_bytes()).await?;
                }
            }
        }

        writer.flush().await?;
        self.terminate();
        Ok(())
    }

    /// Libera la colección y pasa a `Terminated`.
    pub fn terminate(&mut self) {
        self.handle = None;
        self.state = SessionState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_tokens_are_case_insensitive() {
        for word in ["exit", "quit", "bye", "Bye", "EXIT", "  quit  "] {
            assert!(is_exit_token(word), "{word}");
        }
        for word in ["byebye", "exit now", "", "q"] {
            assert!(!is_exit_token(word), "{word}");
        }
    }

    #[test]
    fn summary_display_mentions_reuse() {
        let s = BuildSummary { chunks: 4, embedded: 0, reused: true, entries: 4 };
        assert!(s.to_string().contains("reutilizada"));
    }
}
