//! Content chunking for retrieval
//!
//! Splits text into token-budgeted chunks along semantic boundaries
//! (headers, paragraphs, code fences, lists) with configurable overlap
//! for cross-chunk context continuity.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkMetadata, SourcedChunk};

/// Estimate token count (~4 chars per token for English prose)
///
/// Deliberately cheap: exact tokenization is unnecessary for chunk
/// sizing, only consistency matters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*+]\s|\d+\.\s)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Header,
    Code,
    List,
    Paragraph,
}

/// A coarse section split on blank-line boundaries
#[derive(Debug, Clone)]
struct Section {
    content: String,
    kind: SectionKind,
    /// Header breadcrumb active at this section, outermost first
    headers: Vec<String>,
}

/// Sections merged up to the token budget, pre-overlap
#[derive(Debug, Clone)]
struct MergedSection {
    content: String,
    headers: Vec<String>,
    has_code_block: bool,
    has_list: bool,
}

/// Content chunker with a configured token budget and overlap
pub struct ContentChunker {
    config: ChunkingConfig,
}

impl ContentChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Chunk one source text
    ///
    /// Empty or whitespace-only input yields an empty list. A source
    /// under the token budget yields a single chunk with no overlap.
    pub fn chunk(&self, content: &str) -> Vec<Chunk> {
        let cleaned = normalize(content);
        if cleaned.is_empty() {
            return Vec::new();
        }

        let sections = self.split_into_sections(&cleaned);
        let merged = self.merge_sections(sections);

        let mut char_offset = 0usize;
        let mut chunks: Vec<Chunk> = merged
            .into_iter()
            .enumerate()
            .map(|(index, section)| {
                let start_char = char_offset;
                // +2 accounts for the blank line between sections
                char_offset += section.content.chars().count() + 2;

                Chunk {
                    token_count: estimate_tokens(&section.content),
                    text: section.content,
                    index,
                    metadata: ChunkMetadata {
                        start_char,
                        end_char: char_offset - 2,
                        headers: if self.config.preserve_headers {
                            section.headers
                        } else {
                            Vec::new()
                        },
                        has_code_block: section.has_code_block,
                        has_list: section.has_list,
                    },
                }
            })
            .collect();

        if self.config.overlap_tokens > 0 {
            chunks = add_overlap(chunks, self.config.overlap_tokens);
        }

        chunks
    }

    /// Chunk several sources, tagging each chunk with its source id
    pub fn chunk_multiple<I, S>(&self, items: I) -> Vec<SourcedChunk>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut all = Vec::new();
        for (source_id, content) in items {
            for chunk in self.chunk(content.as_ref()) {
                all.push(SourcedChunk {
                    chunk,
                    source_id: source_id.as_ref().to_string(),
                });
            }
        }
        all
    }

    /// Split normalized text into classified sections, tracking the
    /// rolling header hierarchy
    fn split_into_sections(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current_headers: Vec<String> = Vec::new();

        for block in text.split("\n\n") {
            let trimmed = block.trim();
            if trimmed.is_empty() {
                continue;
            }

            // Headers are single-line blocks matching the markdown pattern
            if !trimmed.contains('\n') {
                if let Some(caps) = HEADER_RE.captures(trimmed) {
                    let level = caps[1].len();
                    let header_text = caps[2].to_string();

                    while current_headers.len() >= level {
                        current_headers.pop();
                    }
                    current_headers.push(header_text);

                    sections.push(Section {
                        content: trimmed.to_string(),
                        kind: SectionKind::Header,
                        headers: current_headers.clone(),
                    });
                    continue;
                }
            }

            let kind = if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                SectionKind::Code
            } else if LIST_RE.is_match(trimmed) {
                SectionKind::List
            } else {
                SectionKind::Paragraph
            };

            sections.push(Section {
                content: trimmed.to_string(),
                kind,
                headers: current_headers.clone(),
            });
        }

        sections
    }

    /// Greedily accumulate sections under the token budget, splitting
    /// oversized sections at sentence boundaries
    fn merge_sections(&self, sections: Vec<Section>) -> Vec<MergedSection> {
        let max_tokens = self.config.max_tokens;
        let mut merged: Vec<MergedSection> = Vec::new();

        let mut current = String::new();
        let mut current_headers: Vec<String> = Vec::new();
        let mut has_code_block = false;
        let mut has_list = false;

        for section in sections {
            let section_tokens = estimate_tokens(&section.content);
            let current_tokens = estimate_tokens(&current);

            let atomic = section.kind == SectionKind::Code && self.config.preserve_code_blocks;

            // Oversized non-atomic sections get sentence-split
            if section_tokens > max_tokens && !atomic {
                if !current.is_empty() {
                    merged.push(MergedSection {
                        content: std::mem::take(&mut current),
                        headers: std::mem::take(&mut current_headers),
                        has_code_block,
                        has_list,
                    });
                    has_code_block = false;
                    has_list = false;
                }

                let mut tail = String::new();
                for sentence in section.content.split_sentence_bounds() {
                    let candidate_tokens = estimate_tokens(&tail) + estimate_tokens(sentence);
                    if candidate_tokens > max_tokens && !tail.is_empty() {
                        merged.push(MergedSection {
                            content: tail.trim().to_string(),
                            headers: section.headers.clone(),
                            has_code_block: false,
                            has_list: section.kind == SectionKind::List,
                        });
                        tail = sentence.to_string();
                    } else {
                        tail.push_str(sentence);
                    }
                }

                if !tail.is_empty() {
                    current = tail.trim().to_string();
                    current_headers = section.headers;
                    has_list = section.kind == SectionKind::List;
                }
                continue;
            }

            // Budget reached: flush and start a new accumulation
            if current_tokens + section_tokens > max_tokens && !current.is_empty() {
                merged.push(MergedSection {
                    content: std::mem::take(&mut current),
                    headers: std::mem::take(&mut current_headers),
                    has_code_block,
                    has_list,
                });
                current = section.content;
                current_headers = section.headers;
                has_code_block = section.kind == SectionKind::Code;
                has_list = section.kind == SectionKind::List;
                continue;
            }

            if current.is_empty() {
                current = section.content;
                current_headers = section.headers;
            } else {
                current.push_str("\n\n");
                current.push_str(&section.content);
            }

            if section.kind == SectionKind::Code {
                has_code_block = true;
            }
            if section.kind == SectionKind::List {
                has_list = true;
            }
        }

        if !current.is_empty() {
            merged.push(MergedSection {
                content: current,
                headers: current_headers,
                has_code_block,
                has_list,
            });
        }

        merged
    }
}

impl Default for ContentChunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

/// Normalize line endings, collapse 3+ newlines to 2, trim
fn normalize(content: &str) -> String {
    static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

    let unified = content.replace("\r\n", "\n");
    MULTI_NEWLINE.replace_all(&unified, "\n\n").trim().to_string()
}

/// Prepend a tail of the previous chunk to each chunk after the first
///
/// The overlap fragment is always taken from the previous chunk's text
/// as originally produced, never from its already-overlapped form, so
/// overlap does not compound across chunks.
fn add_overlap(chunks: Vec<Chunk>, overlap_tokens: usize) -> Vec<Chunk> {
    if chunks.len() <= 1 {
        return chunks;
    }

    let overlap_chars = overlap_tokens * 4;
    let originals: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, mut chunk)| {
            if i == 0 {
                return chunk;
            }

            let tail = char_tail(&originals[i - 1], overlap_chars);
            // Advance to the next word boundary so the overlap does not
            // open mid-word
            let clean = match tail.find(' ') {
                Some(pos) if pos > 0 => &tail[pos + 1..],
                _ => tail,
            };

            let text = format!("{}\n\n{}", clean, chunk.text);
            chunk.token_count = estimate_tokens(&text);
            chunk.text = text;
            chunk
        })
        .collect()
}

/// Last `n` chars of `text`, respecting char boundaries
fn char_tail(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let (byte_idx, _) = text.char_indices().nth(count - n).unwrap();
    &text[byte_idx..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_tokens: usize, overlap_tokens: usize) -> ContentChunker {
        ContentChunker::new(ChunkingConfig {
            max_tokens,
            overlap_tokens,
            ..ChunkingConfig::default()
        })
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let c = ContentChunker::default();
        assert!(c.chunk("").is_empty());
        assert!(c.chunk("   \n\n  \t ").is_empty());
    }

    #[test]
    fn small_input_yields_single_chunk_without_overlap() {
        let c = ContentChunker::default();
        let chunks = c.chunk("A short paragraph.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "A short paragraph.");
        assert_eq!(chunks[0].token_count, estimate_tokens("A short paragraph."));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn chunks_respect_token_budget() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} has a handful of words in it.", i))
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = chunker(30, 0).chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.token_count <= 30,
                "chunk {} over budget: {}",
                chunk.index,
                chunk.token_count
            );
        }
    }

    #[test]
    fn indices_are_strictly_increasing() {
        let text = (0..20)
            .map(|i| format!("Sentence group {} with filler words to pad length.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunker(20, 0).chunk(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn header_hierarchy_is_tracked() {
        let text = "# Intro\n\nHello world. This is a test.\n\n## Section\n\nMore content here that is long enough to matter.";
        let chunks = chunker(20, 0).chunk(text);

        assert!(chunks.len() >= 2);
        assert!(chunks[0].metadata.headers.contains(&"Intro".to_string()));
        let last = chunks.last().unwrap();
        assert_eq!(last.metadata.headers, vec!["Intro", "Section"]);
    }

    #[test]
    fn sibling_header_replaces_previous_at_same_level() {
        let text = "# Top\n\n## First\n\nSome text in the first section.\n\n## Second\n\nSome text in the second section.";
        let chunks = chunker(10, 0).chunk(text);
        let last = chunks.last().unwrap();
        assert_eq!(last.metadata.headers, vec!["Top", "Second"]);
    }

    #[test]
    fn code_blocks_are_kept_atomic() {
        let code = format!("```\n{}\n```", "let x = 1;\n".repeat(60));
        let text = format!("Intro paragraph.\n\n{}\n\nOutro paragraph.", code);
        let chunks = chunker(30, 0).chunk(&text);

        let code_chunk = chunks
            .iter()
            .find(|c| c.metadata.has_code_block)
            .expect("code chunk present");
        assert!(code_chunk.text.contains("let x = 1;"));
        // Atomic code may overshoot the budget; nothing else may
        for chunk in chunks.iter().filter(|c| !c.metadata.has_code_block) {
            assert!(chunk.token_count <= 30);
        }
    }

    #[test]
    fn list_sections_are_flagged() {
        let text = "Intro text.\n\n- first item\n- second item\n- third item";
        let chunks = chunker(256, 0).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.has_list);
    }

    #[test]
    fn oversized_paragraph_splits_at_sentences() {
        let long = "This sentence repeats to grow well past the budget. ".repeat(30);
        let chunks = chunker(25, 0).chunk(long.trim());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 25);
            assert!(chunk.text.trim_end().ends_with('.'));
        }
    }

    #[test]
    fn overlap_prepends_previous_tail() {
        let text = (0..10)
            .map(|i| format!("Paragraph {} with enough words to fill the budget nicely.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let without = chunker(20, 0).chunk(&text);
        let with = chunker(20, 5).chunk(&text);

        assert_eq!(without.len(), with.len());
        assert_eq!(without[0].text, with[0].text);
        for i in 1..with.len() {
            assert!(with[i].text.ends_with(&without[i].text));
            assert!(with[i].text.chars().count() > without[i].text.chars().count());
        }
    }

    #[test]
    fn overlap_does_not_compound() {
        let text = (0..10)
            .map(|i| format!("Paragraph {} with enough words to fill the budget nicely.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let without = chunker(20, 5).chunk(&text);
        let with = chunker(20, 5).chunk(&text);

        // The overlap prefix of chunk N is sourced from chunk N-1's
        // pre-overlap text: fragment length is bounded by the overlap
        // budget, not by N.
        let plain = chunker(20, 0).chunk(&text);
        for i in 1..with.len() {
            let prefix_len =
                with[i].text.chars().count() - plain[i].text.chars().count() - 2;
            assert!(
                prefix_len <= 5 * 4,
                "chunk {} overlap grew past the budget: {}",
                i,
                prefix_len
            );
        }
        // Deterministic across runs
        for (a, b) in without.iter().zip(with.iter()) {
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn coverage_reconstructs_normalized_source() {
        let text = "# Title\r\n\r\n\r\nFirst paragraph with words.\n\n\n\nSecond paragraph with more words.\n\n- a list\n- of items";
        let normalized = normalize(text);
        let chunks = chunker(256, 0).chunk(text);

        let rebuilt = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rebuilt, normalized);
    }

    #[test]
    fn char_offsets_are_consistent() {
        let text = (0..8)
            .map(|i| format!("Paragraph {} that has some words in it for padding.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunker(20, 0).chunk(&text);

        let mut prev_end = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                assert_eq!(chunk.metadata.start_char, prev_end + 2);
            }
            assert_eq!(
                chunk.metadata.end_char - chunk.metadata.start_char,
                chunk.text.chars().count()
            );
            prev_end = chunk.metadata.end_char;
        }
    }

    #[test]
    fn chunk_multiple_tags_sources() {
        let c = ContentChunker::default();
        let all = c.chunk_multiple(vec![
            ("src-a", "Some content for the first source."),
            ("src-b", "Some content for the second source."),
        ]);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].source_id, "src-a");
        assert_eq!(all[1].source_id, "src-b");
        assert_eq!(all[1].chunk.index, 0);
    }

    #[test]
    fn preserve_headers_disabled_drops_breadcrumbs() {
        let c = ContentChunker::new(ChunkingConfig {
            preserve_headers: false,
            ..ChunkingConfig::default()
        });
        let chunks = c.chunk("# Title\n\nBody text under the title.");
        assert!(chunks.iter().all(|ch| ch.metadata.headers.is_empty()));
    }
}
