//! Troceado del documento en unidades recuperables etiquetadas con su sección.
//!
//! Cada párrafo de cuerpo no vacío produce un chunk. Los encabezados no producen
//! chunk: sólo actualizan la categoría vigente, que heredan los párrafos
//! siguientes hasta el próximo encabezado.

use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Trocea `document` en orden. Cada chunk recibe un identificador nuevo.
pub fn chunk(document: &Document) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current_category = String::new();

    for paragraph in &document.paragraphs {
        let text = paragraph.text.trim();
        if paragraph.is_heading() {
            current_category = text.to_string();
            continue;
        }
        if text.is_empty() {
            continue;
        }
        chunks.push(Chunk {
            id: Uuid::new_v4().to_string(),
            category: current_category.clone(),
            text: labeled_text(&current_category, text),
            embedding: None,
        });
    }

    chunks
}

fn labeled_text(category: &str, text: &str) -> String {
    if category.is_empty() {
        text.to_string()
    } else {
        format!("{category}: {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paragraph;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn chunks_inherit_the_preceding_heading() {
        let doc = Document::new(
            "test",
            vec![
                Paragraph::heading(1, "A"),
                Paragraph::body("x"),
                Paragraph::body("y"),
                Paragraph::heading(1, "B"),
                Paragraph::body("z"),
            ],
        );
        let chunks = chunk(&doc);
        assert_eq!(texts(&chunks), vec!["A: x", "A: y", "B: z"]);
        assert_eq!(chunks[2].category, "B");
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[test]
    fn blank_paragraphs_are_skipped() {
        let doc = Document::new(
            "test",
            vec![Paragraph::body("first"), Paragraph::body("   "), Paragraph::body("second")],
        );
        assert_eq!(texts(&chunk(&doc)), vec!["first", "second"]);
    }

    #[test]
    fn no_headings_means_no_prefix() {
        let doc = Document::new("test", vec![Paragraph::body("  plain text  ")]);
        let chunks = chunk(&doc);
        assert_eq!(texts(&chunks), vec!["plain text"]);
        assert_eq!(chunks[0].category, "");
    }

    #[test]
    fn only_headings_yield_nothing() {
        let doc = Document::new("test", vec![Paragraph::heading(1, "A"), Paragraph::heading(2, "B")]);
        assert!(chunk(&doc).is_empty());
    }

    #[test]
    fn heading_text_is_trimmed() {
        let doc = Document::new(
            "test",
            vec![Paragraph::heading(2, "  Pricing \t"), Paragraph::body("iPhone 15 is $799")],
        );
        assert_eq!(texts(&chunk(&doc)), vec!["Pricing: iPhone 15 is $799"]);
    }

    #[test]
    fn ids_are_unique() {
        let doc = Document::new("test", (0..50).map(|i| Paragraph::body(format!("p{i}"))).collect());
        let chunks = chunk(&doc);
        let ids: HashSet<_> = chunks.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), chunks.len());
    }

    fn arb_paragraph() -> impl Strategy<Value = Paragraph> {
        (any::<bool>(), "[ a-zA-Z0-9$]{0,20}").prop_map(|(heading, text)| {
            if heading {
                Paragraph::heading(1, text)
            } else {
                Paragraph::body(text)
            }
        })
    }

    proptest! {
        #[test]
        fn chunking_is_deterministic(paragraphs in proptest::collection::vec(arb_paragraph(), 0..30)) {
            let doc = Document::new("prop", paragraphs);
            let first = chunk(&doc);
            let second = chunk(&doc);
            let project = |cs: &[Chunk]| -> Vec<(String, String)> {
                cs.iter().map(|c| (c.category.clone(), c.text.clone())).collect()
            };
            prop_assert_eq!(project(&first), project(&second));
            prop_assert!(first.iter().all(|c| !c.text.is_empty()));
        }
    }
}
