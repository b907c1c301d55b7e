//! Carga de un documento estructurado desde disco.
//!
//! El resultado es siempre una secuencia ordenada de párrafos con su estilo;
//! el troceado posterior sólo depende de ese contrato.

use std::{fs, path::Path};

use mime_guess::MimeGuess;
use tracing::{info, warn};

use crate::{
    docx,
    error::{QaError, Result},
    models::{Document, Paragraph},
};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Lee `path` y lo convierte en un [`Document`] según su tipo.
///
/// - Word (`.docx`): párrafos con su estilo; "Heading N" marca encabezados.
/// - Markdown / texto plano: las líneas `#`..`######` son encabezados.
/// - JSON: lista de `{ "style", "text" }` exportada de un procesador de textos.
/// - PDF: sin información de estilos; cada línea no vacía es un párrafo.
pub fn load_document(path: &Path) -> Result<Document> {
    let path_str = path.display().to_string();
    if !path.is_file() {
        return Err(QaError::document(path_str, "el fichero no existe"));
    }

    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();
    let mime = MimeGuess::from_path(path).first_or_text_plain();

    let paragraphs = match (extension.as_str(), mime.essence_str()) {
        ("json", _) | (_, "application/json") => {
            let raw = fs::read_to_string(path).map_err(|e| QaError::document(&path_str, e))?;
            parse_json(&raw).map_err(|e| QaError::document(&path_str, e))?
        }
        ("docx", _) | (_, DOCX_MIME) => {
            let file = fs::File::open(path).map_err(|e| QaError::document(&path_str, e))?;
            docx::read_paragraphs(file).map_err(|e| QaError::document(&path_str, e))?
        }
        ("pdf", _) | (_, "application/pdf") => {
            let raw = pdf_extract::extract_text(path).map_err(|e| QaError::document(&path_str, e))?;
            parse_plain_lines(&raw)
        }
        ("md" | "markdown" | "txt", _) => {
            let raw = fs::read_to_string(path).map_err(|e| QaError::document(&path_str, e))?;
            parse_markdown(&raw)
        }
        (other, mime) => {
            warn!("Extensión no soportada ('.{}', {}): {}", other, mime, path_str);
            return Err(QaError::document(
                path_str,
                format!("formato no soportado ('.{other}')"),
            ));
        }
    };

    info!("Documento cargado: {} ({} párrafos)", path_str, paragraphs.len());
    Ok(Document::new(path_str, paragraphs))
}

/// Un párrafo por línea; `#` a `######` seguidos de espacio marcan un encabezado.
pub fn parse_markdown(raw: &str) -> Vec<Paragraph> {
    raw.lines()
        .map(|line| match heading_level(line) {
            Some((level, text)) => Paragraph::heading(level, text.trim()),
            None => Paragraph::body(line),
        })
        .collect()
}

fn heading_level(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some((level, rest))
    } else {
        None
    }
}

pub fn parse_json(raw: &str) -> std::result::Result<Vec<Paragraph>, serde_json::Error> {
    serde_json::from_str(raw)
}

fn parse_plain_lines(raw: &str) -> Vec<Paragraph> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Paragraph::body)
        .collect()
}
