use serde::{Deserialize, Serialize};

/// A source document as handed over by the extraction layer: a title used
/// for citations plus raw page texts in page order. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub pages: Vec<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            pages,
        }
    }
}

/// Normalize extracted page text before chunking: control characters become
/// spaces, whitespace runs collapse, and stray gaps the extractor leaves
/// before punctuation are closed.
pub fn clean_page_text(raw: &str) -> String {
    let despaced: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut cleaned = String::with_capacity(despaced.len());
    for word in despaced.split_whitespace() {
        if !cleaned.is_empty() {
            let starts_with_punct = word
                .chars()
                .next()
                .is_some_and(|c| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'));
            if !starts_with_punct {
                cleaned.push(' ');
            }
        }
        cleaned.push_str(word);
    }
    cleaned
}
