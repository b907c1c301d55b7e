//! Modelos de dominio (párrafos del documento, chunks y entradas del índice).

use serde::{Deserialize, Serialize};

/// Prefijo del nombre de estilo que marca un párrafo como encabezado.
pub const HEADING_STYLE_PREFIX: &str = "Heading";

/// Estilo por defecto de un párrafo de cuerpo.
pub const BODY_STYLE: &str = "Normal";

/// Un párrafo del documento tal como lo entrega el parser: nombre de estilo y texto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default = "default_style")]
    pub style: String,
    pub text: String,
}

fn default_style() -> String {
    BODY_STYLE.to_string()
}

impl Paragraph {
    pub fn new(style: impl Into<String>, text: impl Into<String>) -> Self {
        Self { style: style.into(), text: text.into() }
    }

    /// Encabezado de nivel `level` (`Heading 1`, `Heading 2`, ...).
    pub fn heading(level: usize, text: impl Into<String>) -> Self {
        Self::new(format!("{HEADING_STYLE_PREFIX} {level}"), text)
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self::new(BODY_STYLE, text)
    }

    pub fn is_heading(&self) -> bool {
        self.style.starts_with(HEADING_STYLE_PREFIX)
    }
}

/// Documento estructurado: secuencia ordenada de párrafos.
/// Es transitorio; no se conserva después de trocearlo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    pub fn new(source: impl Into<String>, paragraphs: Vec<Paragraph>) -> Self {
        Self { source: source.into(), paragraphs }
    }
}

/// Unidad recuperable de texto con su categoría (último encabezado visto).
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub category: String,
    pub text: String,
    /// `None` hasta que se calcula el embedding.
    pub embedding: Option<Vec<f64>>,
}

/// Entrada persistida en una colección del índice vectorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f64>,
    pub text: String,
}
