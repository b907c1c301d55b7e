//! Normalización y enriquecimiento de la pregunta del usuario con palabras
//! clave del dominio para mejorar el recall de la búsqueda vectorial.

use tracing::debug;

/// Vocabulario del dominio: (disparadores, palabra clave canónica).
/// El orden declarado es el orden en que se añaden las palabras clave.
pub const DOMAIN_VOCABULARY: &[(&[&str], &str)] = &[
    (&["price", "cost"], "pricing"),
    (&["iphone"], "iphone"),
    (&["mac"], "mac"),
    (&["watch"], "watch"),
    (&["ipad"], "ipad"),
    (&["airpods"], "airpods"),
];

/// Pregunta con sus tres formas: original, normalizada y enriquecida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedQuery {
    pub raw: String,
    pub normalized: String,
    pub keywords: Vec<&'static str>,
    pub enhanced: String,
}

impl EnhancedQuery {
    pub fn new(raw: &str) -> Self {
        let normalized = normalize(raw);
        let keywords = extract_keywords(&normalized);
        let enhanced = if keywords.is_empty() {
            raw.to_string()
        } else {
            format!("{} {}", raw, keywords.join(" "))
        };
        Self { raw: raw.to_string(), normalized, keywords, enhanced }
    }
}

/// Recorta espacios y pasa a minúsculas. Sólo se usa para buscar coincidencias.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Palabras clave canónicas presentes en `normalized`, sin duplicados y en el
/// orden del vocabulario. La coincidencia es por subcadena.
pub fn extract_keywords(normalized: &str) -> Vec<&'static str> {
    let mut keywords: Vec<&'static str> = Vec::new();
    for (triggers, canonical) in DOMAIN_VOCABULARY {
        if triggers.iter().any(|t| normalized.contains(t)) && !keywords.contains(canonical) {
            keywords.push(*canonical);
        }
    }
    keywords
}

/// Devuelve la pregunta enriquecida: la original (con su capitalización)
/// seguida de las palabras clave extraídas, o la original sin cambios.
pub fn enhance(raw_query: &str) -> String {
    let query = EnhancedQuery::new(raw_query);
    debug!("Consulta enriquecida: '{}' → '{}'", query.raw, query.enhanced);
    query.enhanced
}
