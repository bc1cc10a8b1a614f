//! Chunk types produced by the content chunker

use serde::{Deserialize, Serialize};

/// Positional and structural metadata captured for a chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Offset of the chunk's original text in the normalized source
    pub start_char: usize,
    /// End offset (exclusive) in the normalized source
    pub end_char: usize,
    /// Enclosing section headings, outermost first
    pub headers: Vec<String>,
    /// Chunk contains a fenced code block
    pub has_code_block: bool,
    /// Chunk contains a bulleted or numbered list
    pub has_list: bool,
}

/// A token-budgeted contiguous span of source text
///
/// Chunks are immutable once created and are produced in strictly
/// increasing `index` order. When overlap is enabled, each chunk after
/// the first begins with a tail fragment of the previous chunk's
/// pre-overlap text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, including any prepended overlap
    pub text: String,
    /// Sequence position within the source, 0-based
    pub index: usize,
    /// Estimated token count for `text`
    pub token_count: usize,
    /// Positional and structural metadata
    pub metadata: ChunkMetadata,
}

/// A chunk tagged with the identifier of the source it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Identifier of the originating source document
    pub source_id: String,
}
