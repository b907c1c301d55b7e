//! Carga y gestión de configuración de la aplicación (documento, índice,
//! embeddings y estrategia de respuesta).

use std::env;
use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};

/// Backend de embeddings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Modelo local determinista (hashing de tokens).
    Local,
    /// API remota de OpenAI a través de Rig.
    OpenAI,
}

impl EmbeddingBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Backend de embeddings no soportado: {other}")),
        }
    }
}

/// Backend del índice vectorial persistente.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBackend {
    File,
    Neo4j,
}

impl IndexBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "neo4j" => Ok(Self::Neo4j),
            other => Err(anyhow!("Backend de índice no soportado: {other}")),
        }
    }
}

/// Estrategia con la que se compone la respuesta final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponderKind {
    /// Fragmentos recuperados + frase de cierre.
    Extractive,
    /// Variantes por palabra clave (precio, especificaciones, ...).
    Keyword,
    /// Delegación en un LLM.
    Generative,
}

impl ResponderKind {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "extractive" => Ok(Self::Extractive),
            "keyword" => Ok(Self::Keyword),
            "generative" => Ok(Self::Generative),
            other => Err(anyhow!("Estrategia de respuesta no soportada: {other}")),
        }
    }
}

/// Credenciales de Neo4j, sólo necesarias con `INDEX_BACKEND=neo4j`.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub document_path: PathBuf,
    pub collection_name: String,

    pub index_backend: IndexBackend,
    pub index_dir: PathBuf,
    pub neo4j: Option<Neo4jConfig>,

    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub local_embedding_dim: usize,

    pub responder: ResponderKind,
    pub chat_model: String,
    pub temperature: f64,
    pub top_k: usize,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    ///
    /// `document_override` tiene prioridad sobre `DOCUMENT_PATH` (se usa para
    /// el primer argumento de la línea de comandos).
    pub fn from_env(document_override: Option<String>) -> Result<Self> {
        Self::from_lookup(document_override, |key| env::var(key).ok())
    }

    /// Igual que [`AppConfig::from_env`] pero con una función de búsqueda
    /// arbitraria, para poder probarla sin tocar el entorno del proceso.
    pub fn from_lookup<F>(document_override: Option<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let document_path = document_override
            .or_else(|| lookup("DOCUMENT_PATH"))
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("Falta DOCUMENT_PATH en el entorno (o como primer argumento)"))?;

        let collection_name = get_or("COLLECTION_NAME", "chat_memory_4agents");

        let index_backend = IndexBackend::from_str(&get_or("INDEX_BACKEND", "file"))?;
        let index_dir = PathBuf::from(get_or("INDEX_DIR", "./vector_index"));

        let neo4j = if index_backend == IndexBackend::Neo4j {
            Some(Neo4jConfig {
                uri: lookup("NEO4J_URI").ok_or_else(|| anyhow!("Falta NEO4J_URI en el entorno"))?,
                user: lookup("NEO4J_USER").ok_or_else(|| anyhow!("Falta NEO4J_USER en el entorno"))?,
                password: lookup("NEO4J_PASSWORD")
                    .ok_or_else(|| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            })
        } else {
            None
        };

        let embedding_backend = EmbeddingBackend::from_str(&get_or("EMBEDDING_BACKEND", "local"))?;
        let embedding_model = get_or("EMBEDDING_MODEL", "text-embedding-ada-002");
        let local_embedding_dim: usize = get_or("LOCAL_EMBEDDING_DIM", "384")
            .parse()
            .context("LOCAL_EMBEDDING_DIM debe ser un entero positivo")?;
        if local_embedding_dim == 0 {
            return Err(anyhow!("LOCAL_EMBEDDING_DIM debe ser mayor que cero"));
        }

        let responder = ResponderKind::from_str(&get_or("RESPONDER", "extractive"))?;
        let chat_model = get_or("CHAT_MODEL", "gpt-3.5-turbo");
        let temperature: f64 = get_or("GENERATION_TEMPERATURE", "0.3")
            .parse()
            .context("GENERATION_TEMPERATURE debe ser un número")?;

        let top_k: usize = get_or("TOP_K", "3")
            .parse()
            .context("TOP_K debe ser un entero positivo")?;
        if top_k == 0 {
            return Err(anyhow!("TOP_K debe ser mayor que cero"));
        }

        Ok(Self {
            document_path,
            collection_name,
            index_backend,
            index_dir,
            neo4j,
            embedding_backend,
            embedding_model,
            local_embedding_dim,
            responder,
            chat_model,
            temperature,
            top_k,
        })
    }
}
