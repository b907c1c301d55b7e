//! Índice vectorial persistente: colecciones con nombre de entradas
//! `(id, embedding, texto)` con consulta por vecinos más cercanos.
//!
//! API pública:
//!   - trait [`VectorIndex`] (`open_or_create`, `count`, `dimensions`, `upsert`,
//!     `upsert_many`, `query`, `clear`)
//!   - [`FileVectorIndex`]: un fichero JSON por colección.
//!   - [`Neo4jVectorIndex`]: nodos `:IndexEntry` en Neo4j.
//!
//! Cada colección registra la dimensión de su primer vector; insertar o
//! consultar con otra dimensión es `IndexUnavailable`.

use std::{collections::HashMap, fs, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::Neo4jConfig,
    error::{QaError, Result},
    models::IndexEntry,
    neo4j_client,
};

/// Referencia a una colección abierta. Sólo es válida para el índice que la creó.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: String,
}

impl CollectionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resultado de [`VectorIndex::open_or_create`].
#[derive(Debug, Clone)]
pub struct OpenedCollection {
    pub handle: CollectionHandle,
    /// `true` si la colección ya existía antes de la llamada.
    pub existed: bool,
}

/// Almacén de vectores con colecciones con nombre.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nombre corto del backend, usado en logs y errores.
    fn backend(&self) -> &str;

    /// Abre la colección `name`, creándola si no existe. Idempotente.
    async fn open_or_create(&self, name: &str) -> Result<OpenedCollection>;

    /// Número de entradas almacenadas.
    async fn count(&self, handle: &CollectionHandle) -> Result<usize>;

    /// Dimensión registrada de la colección; `None` mientras esté vacía.
    async fn dimensions(&self, handle: &CollectionHandle) -> Result<Option<usize>>;

    /// Inserta o sobrescribe la entrada con clave `id`.
    async fn upsert(&self, handle: &CollectionHandle, id: &str, vector: &[f64], text: &str) -> Result<()>;

    /// Inserta un lote de entradas en orden.
    ///
    /// Por defecto llama a [`VectorIndex::upsert`] por cada entrada; si falla a
    /// mitad, las entradas anteriores quedan escritas.
    async fn upsert_many(&self, handle: &CollectionHandle, entries: &[IndexEntry]) -> Result<()> {
        for entry in entries {
            self.upsert(handle, &entry.id, &entry.embedding, &entry.text).await?;
        }
        Ok(())
    }

    /// Hasta `k` textos ordenados por similitud descendente con `vector`.
    /// Los empates se resuelven por orden de inserción. Colección vacía → vacío.
    async fn query(&self, handle: &CollectionHandle, vector: &[f64], k: usize) -> Result<Vec<String>>;

    /// Elimina todas las entradas de la colección y olvida su dimensión.
    async fn clear(&self, handle: &CollectionHandle) -> Result<()>;
}

/// Similitud coseno; 0.0 si alguno de los vectores tiene norma cero.
/// `None` si las longitudes difieren.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

fn dimension_mismatch(backend: &str, expected: usize, got: usize) -> QaError {
    QaError::index(
        backend,
        format!("dimensión incompatible: la colección usa {expected} y el vector tiene {got}"),
    )
}

/// Ordena `entries` (en orden de inserción) por similitud con `vector` y
/// devuelve los `k` primeros textos. La ordenación es estable.
///
/// Una entrada con otra dimensión que `vector` es `IndexUnavailable`.
pub fn rank_entries<'a, I>(backend: &str, entries: I, vector: &[f64], k: usize) -> Result<Vec<String>>
where
    I: IntoIterator<Item = (&'a [f64], &'a str)>,
{
    let mut scored: Vec<(f64, &str)> = Vec::new();
    for (embedding, text) in entries {
        let score = cosine_similarity(embedding, vector)
            .ok_or_else(|| dimension_mismatch(backend, embedding.len(), vector.len()))?;
        scored.push((score, text));
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(scored.into_iter().take(k).map(|(_, text)| text.to_string()).collect())
}

// ---------------------------------------------------------------------
// FICHERO JSON
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl CollectionFile {
    /// Dimensión registrada; en ficheros antiguos se deduce de la primera entrada.
    fn dimensions(&self) -> Option<usize> {
        self.dimensions.or_else(|| self.entries.first().map(|e| e.embedding.len()))
    }

    /// Comprueba todo el lote antes de tocar la colección.
    fn check_batch(&self, entries: &[IndexEntry]) -> Result<Option<usize>> {
        let mut expected = self.dimensions();
        for entry in entries {
            let got = entry.embedding.len();
            match expected {
                Some(dim) if dim != got => return Err(dimension_mismatch("file", dim, got)),
                Some(_) => {}
                None => expected = Some(got),
            }
        }
        Ok(expected)
    }

    fn insert(&mut self, entry: IndexEntry) {
        match self.entries.iter().position(|e| e.id == entry.id) {
            Some(pos) => self.entries[pos] = entry,
            None => self.entries.push(entry),
        }
    }
}

/// Índice persistente en disco: `<dir>/<colección>.json`.
///
/// Las colecciones abiertas se mantienen en memoria en orden de inserción y
/// el fichero se reescribe una vez por `upsert`, `upsert_many` o `clear`.
#[derive(Debug)]
pub struct FileVectorIndex {
    dir: PathBuf,
    collections: RwLock<HashMap<String, CollectionFile>>,
}

impl FileVectorIndex {
    /// Prepara el directorio del índice. Falla si no se puede crear.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| QaError::index("file", format!("{}: {e}", dir.display())))?;
        Ok(Self { dir, collections: RwLock::new(HashMap::new()) })
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    async fn persist(&self, collection: &CollectionFile) -> Result<()> {
        let path = self.collection_path(&collection.name);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(collection).map_err(|e| QaError::index("file", e))?;
        let io_err = |e: std::io::Error| QaError::index("file", format!("{}: {e}", path.display()));
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)
    }

    fn missing(handle: &CollectionHandle) -> QaError {
        QaError::index("file", format!("la colección '{}' no está abierta", handle.name))
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(QaError::index("file", format!("nombre de colección no válido: '{name}'")))
    }
}

#[async_trait]
impl VectorIndex for FileVectorIndex {
    fn backend(&self) -> &str {
        "file"
    }

    async fn open_or_create(&self, name: &str) -> Result<OpenedCollection> {
        validate_collection_name(name)?;
        let handle = CollectionHandle { name: name.to_string() };
        let mut collections = self.collections.write().await;

        if collections.contains_key(name) {
            return Ok(OpenedCollection { handle, existed: true });
        }

        let path = self.collection_path(name);
        let existed = path.is_file();
        let collection = if existed {
            let raw = tokio::fs::read(&path)
                .await
                .map_err(|e| QaError::index("file", format!("{}: {e}", path.display())))?;
            serde_json::from_slice::<CollectionFile>(&raw)
                .map_err(|e| QaError::index("file", format!("{}: {e}", path.display())))?
        } else {
            let now = Utc::now();
            let collection = CollectionFile {
                name: name.to_string(),
                created_at: now,
                updated_at: now,
                dimensions: None,
                entries: Vec::new(),
            };
            self.persist(&collection).await?;
            collection
        };

        info!(
            "Colección '{}' {} ({} entradas).",
            name,
            if existed { "reutilizada" } else { "creada" },
            collection.entries.len()
        );
        collections.insert(name.to_string(), collection);
        Ok(OpenedCollection { handle, existed })
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(&handle.name)
            .map(|c| c.entries.len())
            .ok_or_else(|| Self::missing(handle))
    }

    async fn dimensions(&self, handle: &CollectionHandle) -> Result<Option<usize>> {
        let collections = self.collections.read().await;
        collections
            .get(&handle.name)
            .map(CollectionFile::dimensions)
            .ok_or_else(|| Self::missing(handle))
    }

    async fn upsert(&self, handle: &CollectionHandle, id: &str, vector: &[f64], text: &str) -> Result<()> {
        let entry = IndexEntry { id: id.to_string(), embedding: vector.to_vec(), text: text.to_string() };
        self.upsert_many(handle, std::slice::from_ref(&entry)).await
    }

    async fn upsert_many(&self, handle: &CollectionHandle, entries: &[IndexEntry]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(&handle.name).ok_or_else(|| Self::missing(handle))?;

        let dimensions = collection.check_batch(entries)?;
        for entry in entries {
            collection.insert(entry.clone());
        }
        collection.dimensions = dimensions;
        collection.updated_at = Utc::now();
        debug!(collection = %handle.name, written = entries.len(), "lote persistido");
        self.persist(collection).await
    }

    async fn query(&self, handle: &CollectionHandle, vector: &[f64], k: usize) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let collection = collections.get(&handle.name).ok_or_else(|| Self::missing(handle))?;
        debug!(collection = %handle.name, k, entries = collection.entries.len(), "consulta vectorial");
        rank_entries(
            "file",
            collection.entries.iter().map(|e| (e.embedding.as_slice(), e.text.as_str())),
            vector,
            k,
        )
    }

    async fn clear(&self, handle: &CollectionHandle) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(&handle.name).ok_or_else(|| Self::missing(handle))?;
        collection.entries.clear();
        collection.dimensions = None;
        collection.updated_at = Utc::now();
        self.persist(collection).await
    }
}

// ---------------------------------------------------------------------
// NEO4J
// ---------------------------------------------------------------------

/// Índice sobre Neo4j:
/// `(:Collection {name, next_seq, dimensions})-[:HAS_ENTRY]->(:IndexEntry {id, seq, text, embedding})`.
///
/// `seq` conserva el orden de inserción; la similitud se calcula en cliente
/// con la misma función que el backend de ficheros.
pub struct Neo4jVectorIndex {
    graph: Graph,
}

impl Neo4jVectorIndex {
    /// Conecta con Neo4j y asegura el esquema. Cualquier fallo es `IndexUnavailable`.
    pub async fn connect(cfg: &Neo4jConfig) -> Result<Self> {
        let graph = neo4j_client::connect_from_config(cfg)
            .await
            .map_err(|e| QaError::index("neo4j", e))?;
        neo4j_client::ensure_schema(&graph).await.map_err(|e| QaError::index("neo4j", e))?;
        Ok(Self { graph })
    }
}

fn neo4j_err(e: neo4rs::Error) -> QaError {
    QaError::index("neo4j", e)
}

fn missing_collection(handle: &CollectionHandle) -> QaError {
    QaError::index("neo4j", format!("la colección '{}' no existe", handle.name))
}

#[async_trait]
impl VectorIndex for Neo4jVectorIndex {
    fn backend(&self) -> &str {
        "neo4j"
    }

    async fn open_or_create(&self, name: &str) -> Result<OpenedCollection> {
        let mut cursor = self
            .graph
            .execute(query("MATCH (c:Collection {name: $name}) RETURN c.name AS name").param("name", name))
            .await
            .map_err(neo4j_err)?;
        let existed = cursor.next().await.map_err(neo4j_err)?.is_some();

        if !existed {
            self.graph
                .run(
                    query("MERGE (c:Collection {name: $name}) ON CREATE SET c.created_at = datetime(), c.next_seq = 0")
                        .param("name", name),
                )
                .await
                .map_err(neo4j_err)?;
        }

        info!("Colección '{}' {} en Neo4j.", name, if existed { "reutilizada" } else { "creada" });
        Ok(OpenedCollection { handle: CollectionHandle { name: name.to_string() }, existed })
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (:Collection {name: $name})-[:HAS_ENTRY]->(e:IndexEntry) RETURN count(e) AS n")
                    .param("name", handle.name.clone()),
            )
            .await
            .map_err(neo4j_err)?;
        let n: i64 = match cursor.next().await.map_err(neo4j_err)? {
            Some(row) => row
                .get("n")
                .ok_or_else(|| QaError::index("neo4j", "falta campo 'n' en resultado de Neo4j"))?,
            None => 0,
        };
        Ok(n.max(0) as usize)
    }

    async fn dimensions(&self, handle: &CollectionHandle) -> Result<Option<usize>> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (c:Collection {name: $name}) RETURN c.dimensions AS dims")
                    .param("name", handle.name.clone()),
            )
            .await
            .map_err(neo4j_err)?;
        let row = cursor.next().await.map_err(neo4j_err)?.ok_or_else(|| missing_collection(handle))?;
        // `dims` es null mientras la colección esté vacía.
        Ok(row.get::<i64>("dims").map(|d| d.max(0) as usize))
    }

    async fn upsert(&self, handle: &CollectionHandle, id: &str, vector: &[f64], text: &str) -> Result<()> {
        let got = vector.len() as i64;
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (c:Collection {name: $name})
                     SET c.dimensions = coalesce(c.dimensions, $dims)
                     WITH c
                     SET c.next_seq = CASE WHEN c.dimensions = $dims
                                           THEN coalesce(c.next_seq, 0) + 1
                                           ELSE c.next_seq END
                     RETURN c.next_seq AS seq, c.dimensions AS dims",
                )
                .param("name", handle.name.clone())
                .param("dims", got),
            )
            .await
            .map_err(neo4j_err)?;
        let row = cursor.next().await.map_err(neo4j_err)?.ok_or_else(|| missing_collection(handle))?;
        let dims: i64 = row
            .get("dims")
            .ok_or_else(|| QaError::index("neo4j", "falta campo 'dims' en resultado de Neo4j"))?;
        if dims != got {
            return Err(dimension_mismatch("neo4j", dims.max(0) as usize, vector.len()));
        }
        let seq: i64 = row
            .get("seq")
            .ok_or_else(|| QaError::index("neo4j", "falta campo 'seq' en resultado de Neo4j"))?;

        self.graph
            .run(
                query(
                    "MATCH (c:Collection {name: $name})
                     MERGE (c)-[:HAS_ENTRY]->(e:IndexEntry {id: $id})
                     ON CREATE SET e.seq = $seq
                     SET e.text = $text, e.embedding = $embedding",
                )
                .param("name", handle.name.clone())
                .param("id", id)
                .param("seq", seq)
                .param("text", text)
                .param("embedding", vector.to_vec()),
            )
            .await
            .map_err(neo4j_err)
    }

    async fn query(&self, handle: &CollectionHandle, vector: &[f64], k: usize) -> Result<Vec<String>> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (:Collection {name: $name})-[:HAS_ENTRY]->(e:IndexEntry)
                     RETURN e.text AS text, e.embedding AS embedding
                     ORDER BY e.seq ASC",
                )
                .param("name", handle.name.clone()),
            )
            .await
            .map_err(neo4j_err)?;

        let mut rows: Vec<(Vec<f64>, String)> = Vec::new();
        while let Some(row) = cursor.next().await.map_err(neo4j_err)? {
            let text: String = row
                .get("text")
                .ok_or_else(|| QaError::index("neo4j", "falta campo 'text' en resultado de Neo4j"))?;
            let embedding: Vec<f64> = row
                .get("embedding")
                .ok_or_else(|| QaError::index("neo4j", "falta campo 'embedding' en resultado de Neo4j"))?;
            rows.push((embedding, text));
        }

        debug!(collection = %handle.name, k, entries = rows.len(), "consulta vectorial");
        rank_entries("neo4j", rows.iter().map(|(e, t)| (e.as_slice(), t.as_str())), vector, k)
    }

    async fn clear(&self, handle: &CollectionHandle) -> Result<()> {
        self.graph
            .run(
                query("MATCH (:Collection {name: $name})-[:HAS_ENTRY]->(e:IndexEntry) DETACH DELETE e")
                    .param("name", handle.name.clone()),
            )
            .await
            .map_err(neo4j_err)?;
        self.graph
            .run(query("MATCH (c:Collection {name: $name}) REMOVE c.dimensions").param("name", handle.name.clone()))
            .await
            .map_err(neo4j_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn open_or_create_reports_whether_collection_existed() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let first = index.open_or_create("docs").await.unwrap();
        assert!(!first.existed);
        let second = index.open_or_create("docs").await.unwrap();
        assert!(second.existed);
        assert_eq!(first.handle, second.handle);
    }

    #[tokio::test]
    async fn collections_persist_across_index_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = FileVectorIndex::open(dir.path()).unwrap();
            let opened = index.open_or_create("docs").await.unwrap();
            index.upsert(&opened.handle, "a", &[1.0, 0.0], "alpha").await.unwrap();
        }
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let opened = index.open_or_create("docs").await.unwrap();
        assert!(opened.existed);
        assert_eq!(index.count(&opened.handle).await.unwrap(), 1);
        assert_eq!(index.query(&opened.handle, &[1.0, 0.0], 3).await.unwrap(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn upsert_overwrites_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("docs").await.unwrap().handle;
        index.upsert(&h, "a", &[1.0, 0.0], "old").await.unwrap();
        index.upsert(&h, "a", &[1.0, 0.0], "new").await.unwrap();
        assert_eq!(index.count(&h).await.unwrap(), 1);
        assert_eq!(index.query(&h, &[1.0, 0.0], 1).await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn query_on_empty_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("empty").await.unwrap().handle;
        assert!(index.query(&h, &[0.5, 0.5], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("ties").await.unwrap().handle;
        index.upsert(&h, "1", &[0.0, 1.0], "far").await.unwrap();
        index.upsert(&h, "2", &[1.0, 0.0], "first").await.unwrap();
        index.upsert(&h, "3", &[2.0, 0.0], "second").await.unwrap();
        let got = index.query(&h, &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(got, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn clear_removes_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("docs").await.unwrap().handle;
        index.upsert(&h, "a", &[1.0], "alpha").await.unwrap();
        index.clear(&h).await.unwrap();
        assert_eq!(index.count(&h).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_collection_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let err = index.open_or_create("../escape").await.unwrap_err();
        assert!(matches!(err, QaError::IndexUnavailable { .. }));
    }

    #[test]
    fn unopenable_directory_is_index_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = FileVectorIndex::open(file.path().join("sub")).unwrap_err();
        assert!(matches!(err, QaError::IndexUnavailable { .. }));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_unequal_lengths_is_undefined() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[tokio::test]
    async fn first_vector_fixes_the_collection_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("dims").await.unwrap().handle;
        assert_eq!(index.dimensions(&h).await.unwrap(), None);

        index.upsert(&h, "a", &[1.0, 0.0, 0.0], "alpha").await.unwrap();
        assert_eq!(index.dimensions(&h).await.unwrap(), Some(3));

        let err = index.upsert(&h, "b", &[1.0, 0.0], "beta").await.unwrap_err();
        assert!(matches!(err, QaError::IndexUnavailable { .. }));
        assert_eq!(index.count(&h).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_with_other_dimension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("dims").await.unwrap().handle;
        index.upsert(&h, "a", &[1.0, 0.0, 0.0, 0.0], "alpha").await.unwrap();
        let err = index.query(&h, &[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, QaError::IndexUnavailable { .. }));
    }

    #[tokio::test]
    async fn mixed_batch_is_rejected_without_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("batch").await.unwrap().handle;
        let batch = vec![
            IndexEntry { id: "a".into(), embedding: vec![1.0, 0.0], text: "alpha".into() },
            IndexEntry { id: "b".into(), embedding: vec![1.0, 0.0, 0.0], text: "beta".into() },
        ];
        assert!(index.upsert_many(&h, &batch).await.is_err());
        assert_eq!(index.count(&h).await.unwrap(), 0);
        assert_eq!(index.dimensions(&h).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_is_persisted_once_in_compact_form() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("batch").await.unwrap().handle;
        let batch: Vec<IndexEntry> = (0..10)
            .map(|i| IndexEntry { id: i.to_string(), embedding: vec![i as f64, 1.0], text: format!("t{i}") })
            .collect();
        index.upsert_many(&h, &batch).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("batch.json")).unwrap();
        assert!(!raw.contains('\n'), "se espera JSON compacto");
        let reopened = FileVectorIndex::open(dir.path()).unwrap();
        let h = reopened.open_or_create("batch").await.unwrap().handle;
        assert_eq!(reopened.count(&h).await.unwrap(), 10);
        assert_eq!(reopened.dimensions(&h).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn clear_forgets_the_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileVectorIndex::open(dir.path()).unwrap();
        let h = index.open_or_create("docs").await.unwrap().handle;
        index.upsert(&h, "a", &[1.0, 0.0], "alpha").await.unwrap();
        index.clear(&h).await.unwrap();
        index.upsert(&h, "b", &[1.0, 0.0, 0.0], "beta").await.unwrap();
        assert_eq!(index.dimensions(&h).await.unwrap(), Some(3));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn ranking_is_bounded_and_descending(
            vectors in proptest::collection::vec(proptest::collection::vec(-1.0f64..1.0, 4), 0..20),
            query in proptest::collection::vec(-1.0f64..1.0, 4),
            k in 0usize..25,
        ) {
            let texts: Vec<String> = (0..vectors.len()).map(|i| i.to_string()).collect();
            let ranked = rank_entries(
                "file",
                vectors.iter().zip(&texts).map(|(v, t)| (v.as_slice(), t.as_str())),
                &query,
                k,
            )
            .unwrap();
            prop_assert!(ranked.len() <= k.min(vectors.len()));
            let scores: Vec<f64> = ranked
                .iter()
                .map(|t| cosine_similarity(&vectors[t.parse::<usize>().unwrap()], &query).unwrap())
                .collect();
            for w in scores.windows(2) {
                prop_assert!(w[0] >= w[1]);
            }
        }
    }
}
