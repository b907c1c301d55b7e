use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_rag::{
    config::{AppConfig, EmbeddingBackend, IndexBackend, ResponderKind},
    ingest,
    llm::OpenAiChatBackend,
    Embedder, ExtractiveResponder, FileVectorIndex, GenerativeResponder, KeywordResponder,
    LocalHashEmbedder, Neo4jVectorIndex, OpenAiEmbedder, Responder, Session, VectorIndex,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging (a stderr: stdout es para el usuario)
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env(std::env::args().nth(1)).context("Error al cargar la configuración")?;

    // 3. Cargar el documento
    let document = ingest::load_document(&cfg.document_path).context("Error cargando el documento")?;

    // 4. Elegir backends
    let embedder = build_embedder(&cfg)?;
    let index = build_index(&cfg).await?;
    let responder = build_responder(&cfg)?;
    info!(
        "Backends: embeddings={}, índice={}, respuesta={}",
        embedder.name(),
        index.backend(),
        responder.name()
    );

    // 5. Construir (o reutilizar) la colección
    let mut session = Session::new(embedder, index, responder, cfg.top_k);
    session
        .initialize(&document, &cfg.collection_name)
        .await
        .context("Error construyendo la base de conocimiento")?;

    // 6. Bucle interactivo hasta palabra de salida, fin de entrada o Ctrl+C
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let interrupt = async {
        tokio::signal::ctrl_c().await.ok();
    };
    session.run(stdin, stdout, interrupt).await?;

    info!("✅ Sesión cerrada correctamente.");
    Ok(())
}

fn build_embedder(cfg: &AppConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match cfg.embedding_backend {
        EmbeddingBackend::Local => Arc::new(LocalHashEmbedder::new(cfg.local_embedding_dim)),
        EmbeddingBackend::OpenAI => Arc::new(OpenAiEmbedder::from_env(cfg.embedding_model.clone())?),
    };
    Ok(embedder)
}

async fn build_index(cfg: &AppConfig) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match cfg.index_backend {
        IndexBackend::File => Arc::new(FileVectorIndex::open(&cfg.index_dir)?),
        IndexBackend::Neo4j => {
            let neo4j = cfg.neo4j.as_ref().context("Falta la configuración de Neo4j")?;
            Arc::new(Neo4jVectorIndex::connect(neo4j).await?)
        }
    };
    Ok(index)
}

fn build_responder(cfg: &AppConfig) -> Result<Arc<dyn Responder>> {
    let responder: Arc<dyn Responder> = match cfg.responder {
        ResponderKind::Extractive => Arc::new(ExtractiveResponder),
        ResponderKind::Keyword => Arc::new(KeywordResponder),
        ResponderKind::Generative => {
            let backend = Arc::new(OpenAiChatBackend::from_env(cfg.chat_model.clone())?);
            Arc::new(GenerativeResponder::new(backend).with_temperature(cfg.temperature))
        }
    };
    Ok(responder)
}
