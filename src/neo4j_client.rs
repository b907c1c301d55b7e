use crate::config::Neo4jConfig;
use anyhow::{bail, Result};
use neo4rs::{query, ConfigBuilder, Graph};
use tracing::info;
use url::Url;

/// Esquemas de URI aceptados para el protocolo Bolt.
const BOLT_SCHEMES: &[&str] = &["bolt", "neo4j"];
const DEFAULT_BOLT_PORT: u16 = 7687;
/// Conexiones simultáneas: la sesión es secuencial, basta un pool pequeño.
const MAX_CONNECTIONS: usize = 4;

/// `host:puerto` de una URI Bolt (`bolt://host:7687`, `neo4j://host`).
fn bolt_address(uri: &str) -> Result<String> {
    let url = Url::parse(uri)?;
    if !BOLT_SCHEMES.contains(&url.scheme()) {
        bail!("esquema no soportado en NEO4J_URI ('{}'), se espera bolt:// o neo4j://", url.scheme());
    }
    let Some(host) = url.host_str() else {
        bail!("NEO4J_URI sin host: {uri}");
    };
    Ok(format!("{host}:{}", url.port().unwrap_or(DEFAULT_BOLT_PORT)))
}

/// Abre el pool de conexiones hacia el índice vectorial en Neo4j.
pub async fn connect_from_config(cfg: &Neo4jConfig) -> Result<Graph> {
    let addr = bolt_address(&cfg.uri)?;
    let config = ConfigBuilder::default()
        .uri(&addr)
        .user(&cfg.user)
        .password(&cfg.password)
        .max_connections(MAX_CONNECTIONS)
        .build()?;

    info!(%addr, user = %cfg.user, "Conectando al índice vectorial en Neo4j...");
    let graph = Graph::connect(config).await?;
    info!("Índice vectorial en Neo4j disponible.");
    Ok(graph)
}

/// Crea los constraints usados por el índice vectorial:
/// nombre de colección único e índice sobre el id de las entradas.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT collection_name IF NOT EXISTS
         FOR (c:Collection)
         REQUIRE c.name IS UNIQUE",
        "CREATE INDEX index_entry_id IF NOT EXISTS
         FOR (e:IndexEntry)
         ON (e.id)",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado.");
    Ok(())
}
