//! Backend de generación de texto: lista ordenada de mensajes `{role, content}` → texto.
//! Implementado sobre Rig con OpenAI.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{QaError, Result};

/// Rol de un mensaje del prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Un mensaje del prompt estructurado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Backend que completa una conversación.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String>;
}

/// Backend de chat de OpenAI vía Rig.
///
/// Los mensajes de sistema forman el `preamble`; el último mensaje es el
/// prompt y los anteriores el historial.
pub struct OpenAiChatBackend {
    client: rig::providers::openai::Client,
    model: String,
}

impl OpenAiChatBackend {
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").map(|k| k.is_empty()).unwrap_or(true) {
            return Err(QaError::generation("openai", "falta OPENAI_API_KEY en el entorno"));
        }
        let model = model.into();
        // Modelo de chat por defecto si no se ha configurado otro
        let model = if model.is_empty() { "gpt-3.5-turbo".to_string() } else { model };
        Ok(Self { client: rig::providers::openai::Client::from_env(), model })
    }
}

fn to_rig_message(message: &ChatMessage) -> rig::completion::Message {
    match message.role {
        Role::Assistant => rig::completion::Message::assistant(message.content.clone()),
        Role::System | Role::User => rig::completion::Message::user(message.content.clone()),
    }
}

#[async_trait]
impl GenerationBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        use rig::client::CompletionClient as _;
        use rig::completion::Chat as _;

        let preamble = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let conversation: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
        let (last, history) = conversation
            .split_last()
            .ok_or_else(|| QaError::generation("openai", "no hay mensajes que enviar"))?;

        debug!(backend = "openai", model = %self.model, history = history.len(), "solicitando respuesta");

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .temperature(temperature)
            .build();

        let answer = agent
            .chat(to_rig_message(last), history.iter().map(|m| to_rig_message(m)).collect())
            .await
            .map_err(|e| QaError::generation("openai", e))?;
        Ok(answer.trim().to_string())
    }
}
