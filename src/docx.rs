//! Lectura de documentos Word (`.docx`).
//!
//! Un `.docx` es un zip; los párrafos están en `word/document.xml` y cada uno
//! referencia su estilo por id (`<w:pStyle w:val="Heading1"/>`). Los ids se
//! traducen al nombre visible del estilo con `word/styles.xml`, que es lo que
//! usa la detección de encabezados ("Heading 1", "Heading 2", ...).

use std::{
    collections::HashMap,
    io::{Read, Seek},
};

use quick_xml::{
    events::{attributes::AttrError, BytesStart, Event},
    Reader,
};
use zip::{result::ZipError, ZipArchive};

use crate::models::{Paragraph, BODY_STYLE, HEADING_STYLE_PREFIX};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("contenedor zip no válido: {0}")]
    Zip(#[from] ZipError),

    #[error("XML no válido: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("atributo XML no válido: {0}")]
    Attr(#[from] AttrError),

    #[error("error de lectura: {0}")]
    Io(#[from] std::io::Error),

    #[error("falta la parte '{0}' en el documento")]
    MissingPart(&'static str),
}

/// Párrafos del documento en orden, con el nombre de estilo resuelto.
pub fn read_paragraphs<R: Read + Seek>(reader: R) -> Result<Vec<Paragraph>, DocxError> {
    let mut archive = ZipArchive::new(reader)?;
    let styles = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => parse_style_names(&xml)?,
        None => HashMap::new(),
    };
    let body = read_part(&mut archive, DOCUMENT_PART)?.ok_or(DocxError::MissingPart(DOCUMENT_PART))?;
    parse_document(&body, &styles)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>, DocxError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, DocxError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// `styleId → nombre` a partir de `word/styles.xml`.
fn parse_style_names(xml: &str) -> Result<HashMap<String, String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut names = HashMap::new();
    let mut current_id: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"style" => {
                current_id = attribute(&e, b"styleId")?;
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"name" => {
                if let (Some(id), Some(name)) = (current_id.as_ref(), attribute(&e, b"val")?) {
                    names.insert(id.clone(), name);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"style" => current_id = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

/// Nombre visible del estilo. Word guarda los integrados en minúsculas
/// ("heading 1"), se normalizan al prefijo de encabezado.
fn style_name(style_id: &str, styles: &HashMap<String, String>) -> String {
    if style_id.is_empty() {
        return BODY_STYLE.to_string();
    }
    let name = styles.get(style_id).map(String::as_str).unwrap_or(style_id);
    match name.strip_prefix("heading") {
        Some(rest) => format!("{HEADING_STYLE_PREFIX}{rest}"),
        None => name.to_string(),
    }
}

#[derive(Default)]
struct OpenParagraph {
    style_id: String,
    text: String,
}

fn parse_document(xml: &str, styles: &HashMap<String, String>) -> Result<Vec<Paragraph>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    // Pila: los cuadros de texto anidan párrafos dentro de otro párrafo.
    let mut open: Vec<OpenParagraph> = Vec::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => open.push(OpenParagraph::default()),
                b"r" => in_run = true,
                b"t" => in_text = true,
                b"pStyle" => set_style(&mut open, &e)?,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(Paragraph::body("")),
                b"pStyle" => set_style(&mut open, &e)?,
                b"tab" if in_run => push_text(&mut open, "\t"),
                b"br" | b"cr" if in_run => push_text(&mut open, "\n"),
                _ => {}
            },
            Event::Text(t) if in_text => push_text(&mut open, &t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => {
                    if let Some(p) = open.pop() {
                        paragraphs.push(Paragraph::new(style_name(&p.style_id, styles), p.text));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

fn set_style(open: &mut [OpenParagraph], element: &BytesStart<'_>) -> Result<(), DocxError> {
    if let (Some(p), Some(id)) = (open.last_mut(), attribute(element, b"val")?) {
        p.style_id = id;
    }
    Ok(())
}

fn push_text(open: &mut [OpenParagraph], text: &str) {
    if let Some(p) = open.last_mut() {
        p.text.push_str(text);
    }
}
