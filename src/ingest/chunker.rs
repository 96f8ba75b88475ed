use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;

use super::document::Document;

/// The unit of retrieval: a bounded span of one page's text with the
/// provenance needed for citations. `chunk_id` is a stable content hash, so
/// re-chunking identical input reproduces identical ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub title: String,
    pub page: u32,
    pub text: String,
    pub char_len: usize,
}

impl Chunk {
    fn new(title: &str, page: u32, seq: usize, text: String) -> Self {
        let chunk_id = derive_chunk_id(title, page, seq, &text);
        let char_len = text.chars().count();
        Self {
            chunk_id,
            title: title.to_string(),
            page,
            text,
            char_len,
        }
    }
}

fn derive_chunk_id(title: &str, page: u32, seq: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update((seq as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Splits cleaned page text into overlapping character windows, preferring
/// to cut at sentence endings near the window tail. Chunks never cross page
/// boundaries: every chunk is a contiguous substring of exactly one page.
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Chunk every page of a document, in page order. Pages are 1-indexed in
    /// the produced metadata.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (page_idx, page_text) in document.pages.iter().enumerate() {
            self.chunk_page(&document.title, (page_idx + 1) as u32, page_text, &mut chunks);
        }
        tracing::debug!(title = %document.title, chunks = chunks.len(), "document chunked");
        chunks
    }

    fn chunk_page(&self, title: &str, page: u32, text: &str, out: &mut Vec<Chunk>) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let max = self.config.max_chars.max(1);

        // A short page is exactly one chunk, never padded or merged.
        if chars.len() <= max {
            out.push(Chunk::new(title, page, out.len(), trimmed.to_string()));
            return;
        }

        let step = max.saturating_sub(self.config.overlap_chars).max(1);
        let mut start = 0;
        while start < chars.len() {
            let end = (start + max).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let piece = if end < chars.len() {
                snap_to_sentence_end(&window)
            } else {
                window
            };
            let piece = piece.trim();
            if !piece.is_empty() {
                out.push(Chunk::new(title, page, out.len(), piece.to_string()));
            }
            if end >= chars.len() {
                break;
            }
            start += step;
        }
    }
}

/// Cut the window back to the last sentence ending in its final fifth, when
/// one exists. Character-indexed so multi-byte text never splits mid-char.
fn snap_to_sentence_end(window: &str) -> String {
    let chars: Vec<char> = window.chars().collect();
    let search_floor = chars.len() * 4 / 5;

    let mut i = chars.len();
    while i > search_floor + 1 {
        i -= 1;
        if chars[i].is_whitespace() && matches!(chars[i - 1], '.' | '!' | '?') {
            return chars[..i].iter().collect();
        }
    }
    window.to_string()
}
