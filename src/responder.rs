//! Composición de la respuesta final a partir del contexto recuperado.
//!
//! Tres estrategias intercambiables detrás de [`Responder`]:
//!   - [`GenerativeResponder`]: prompt estructurado + backend de generación.
//!   - [`ExtractiveResponder`]: fragmentos sustanciales + frase de cierre.
//!   - [`KeywordResponder`]: variantes según palabras clave de la pregunta.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Result,
    llm::{ChatMessage, GenerationBackend},
    rag::CONTEXT_SEPARATOR,
};

/// Instrucción de sistema del prompt generativo.
pub const SYSTEM_INSTRUCTION: &str =
    "You are an expert assistant. Use the context below to answer questions clearly and politely.";

/// Temperatura baja para respuestas casi deterministas.
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Longitud mínima (en caracteres, tras recortar) de un fragmento "sustancial".
pub const MIN_FRAGMENT_CHARS: usize = 10;

/// Número máximo de fragmentos incluidos en la respuesta extractiva.
pub const MAX_FRAGMENTS: usize = 2;

pub const NO_CONTEXT_MESSAGE: &str = "I'm sorry, I couldn't find relevant information to answer your question. Could you please rephrase or ask about a different Apple product?";

pub const NOT_SPECIFIC_MESSAGE: &str = "I found some information but it wasn't specific enough to answer your question. Could you please ask about a specific Apple product or feature?";

pub const CLOSING_SENTENCE: &str = "This information should help answer your question about Apple products. Is there anything specific you'd like to know more about?";

pub const KEYWORD_NO_CONTEXT_MESSAGE: &str = "I don't have enough information to answer that question. Please try asking about Apple products, pricing, or specifications.";

/// Estrategia de respuesta: `(contexto, pregunta) → respuesta`.
#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(&self, context: &str, raw_query: &str) -> Result<String>;
}

// ---------------------------------------------------------------------
// GENERATIVA
// ---------------------------------------------------------------------

pub struct GenerativeResponder {
    backend: Arc<dyn GenerationBackend>,
    temperature: f64,
}

impl GenerativeResponder {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend, temperature: DEFAULT_TEMPERATURE }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Prompt estructurado: instrucción, bloque de contexto literal y pregunta literal.
    pub fn build_messages(context: &str, raw_query: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(format!("Context:\n{context}")),
            ChatMessage::user(raw_query),
        ]
    }
}

#[async_trait]
impl Responder for GenerativeResponder {
    fn name(&self) -> &str {
        "generative"
    }

    async fn respond(&self, context: &str, raw_query: &str) -> Result<String> {
        let messages = Self::build_messages(context, raw_query);
        self.backend.complete(&messages, self.temperature).await
    }
}

// ---------------------------------------------------------------------
// EXTRACTIVA
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ExtractiveResponder;

impl ExtractiveResponder {
    pub fn compose(context: &str) -> String {
        if context.is_empty() {
            return NO_CONTEXT_MESSAGE.to_string();
        }

        let fragments: Vec<&str> = context
            .split(CONTEXT_SEPARATOR)
            .map(str::trim)
            .filter(|f| f.chars().count() > MIN_FRAGMENT_CHARS)
            .take(MAX_FRAGMENTS)
            .collect();

        if fragments.is_empty() {
            return NOT_SPECIFIC_MESSAGE.to_string();
        }

        format!("{}\n\n{}", fragments.join("\n\n"), CLOSING_SENTENCE)
    }
}

#[async_trait]
impl Responder for ExtractiveResponder {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn respond(&self, context: &str, _raw_query: &str) -> Result<String> {
        Ok(Self::compose(context))
    }
}

// ---------------------------------------------------------------------
// POR PALABRAS CLAVE
// ---------------------------------------------------------------------

/// Respuestas por reglas; gana la primera rama que coincide, en este orden:
/// precio/coste, especificaciones/características, "apple", por defecto.
#[derive(Debug, Clone, Default)]
pub struct KeywordResponder;

impl KeywordResponder {
    pub fn compose(context: &str, raw_query: &str) -> String {
        if context.is_empty() {
            return KEYWORD_NO_CONTEXT_MESSAGE.to_string();
        }

        let context_lower = context.to_lowercase();
        let query_lower = raw_query.to_lowercase();

        if query_lower.contains("price") || query_lower.contains("cost") {
            if context_lower.contains("iphone") || context_lower.contains("mac") {
                format!(
                    "Based on the information I have: {}... For specific pricing details, please refer to the context above.",
                    preview(context, 200)
                )
            } else {
                format!("Here's what I found about pricing: {}...", preview(context, 300))
            }
        } else if query_lower.contains("spec") || query_lower.contains("feature") {
            format!("Here are the specifications and features I found: {}...", preview(context, 300))
        } else if query_lower.contains("apple") {
            format!("Here's what I know about Apple products: {}...", preview(context, 300))
        } else {
            format!(
                "Based on the available information: {}... Is there something specific about Apple products you'd like to know?",
                preview(context, 300)
            )
        }
    }
}

/// Primeros `max_chars` caracteres (respetando límites de carácter).
fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Responder for KeywordResponder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn respond(&self, context: &str, raw_query: &str) -> Result<String> {
        Ok(Self::compose(context, raw_query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QaError;
    use crate::llm::Role;
    use std::sync::Mutex;

    #[test]
    fn extractive_empty_context_apologises() {
        assert_eq!(ExtractiveResponder::compose(""), NO_CONTEXT_MESSAGE);
    }

    #[test]
    fn extractive_keeps_first_two_substantial_fragments() {
        let context = ["short", "Pricing: iPhone 15 is $799", "Mac: MacBook Air is $999", "Watch: Series 9 is $399"]
            .join(CONTEXT_SEPARATOR);
        let answer = ExtractiveResponder::compose(&context);
        assert_eq!(
            answer,
            format!("Pricing: iPhone 15 is $799\n\nMac: MacBook Air is $999\n\n{CLOSING_SENTENCE}")
        );
    }

    #[test]
    fn extractive_without_substantial_fragments() {
        let context = ["tiny", "0123456789"].join(CONTEXT_SEPARATOR);
        assert_eq!(ExtractiveResponder::compose(&context), NOT_SPECIFIC_MESSAGE);
    }

    #[test]
    fn keyword_branches_are_first_match_wins() {
        let ctx = "Pricing: iPhone 15 is $799";
        assert!(KeywordResponder::compose(ctx, "price of the spec sheet?").starts_with("Based on the information I have:"));
        assert!(KeywordResponder::compose("Watch: $399", "what does it cost").starts_with("Here's what I found about pricing:"));
        assert!(KeywordResponder::compose(ctx, "Apple features").starts_with("Here are the specifications"));
        assert!(KeywordResponder::compose(ctx, "tell me about apple").starts_with("Here's what I know about Apple"));
        assert!(KeywordResponder::compose(ctx, "hello").ends_with("you'd like to know?"));
        assert_eq!(KeywordResponder::compose("", "price"), KEYWORD_NO_CONTEXT_MESSAGE);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("ñandú", 2), "ña");
        assert_eq!(preview("abc", 10), "abc");
    }

    #[test]
    fn generative_prompt_is_exact() {
        let messages = GenerativeResponder::build_messages("ctx\n---\nmore", "What is the iPhone price?");
        assert_eq!(
            messages,
            vec![
                ChatMessage::system(
                    "You are an expert assistant. Use the context below to answer questions clearly and politely."
                ),
                ChatMessage::user("Context:\nctx\n---\nmore"),
                ChatMessage::user("What is the iPhone price?"),
            ]
        );
    }

    struct RecordingBackend {
        seen: Mutex<Vec<(Vec<ChatMessage>, f64)>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
            self.seen.lock().unwrap().push((messages.to_vec(), temperature));
            if self.fail {
                Err(QaError::generation("recording", "boom"))
            } else {
                Ok("generated".to_string())
            }
        }
    }

    #[tokio::test]
    async fn generative_delegates_with_low_temperature() {
        let backend = Arc::new(RecordingBackend { seen: Mutex::new(Vec::new()), fail: false });
        let responder = GenerativeResponder::new(backend.clone());
        assert_eq!(responder.respond("ctx", "q").await.unwrap(), "generated");
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0[0].role, Role::System);
        assert!((seen[0].1 - DEFAULT_TEMPERATURE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn generative_failure_is_typed() {
        let backend = Arc::new(RecordingBackend { seen: Mutex::new(Vec::new()), fail: true });
        let err = GenerativeResponder::new(backend).respond("ctx", "q").await.unwrap_err();
        assert!(matches!(err, QaError::GenerationBackend { .. }));
    }
}
