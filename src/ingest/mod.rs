//! Document ingestion: page-wise cleanup and chunking.
//!
//! PDF extraction lives outside this crate; ingestion starts from clean page
//! text and ends at the chunks the index embeds.

mod chunker;
mod document;

pub use chunker::{Chunk, Chunker};
pub use document::{clean_page_text, Document};
