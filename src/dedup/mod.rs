//! Multi-level content deduplication
//!
//! Three levels, cheapest first:
//! 1. Exact hash: SHA-256 over normalized content for identical re-scrapes
//! 2. MinHash: shingle-based signatures for near-duplicate detection
//! 3. Semantic: cosine similarity over embeddings for paraphrased content

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Number of hash permutations in a MinHash signature
pub const DEFAULT_NUM_PERMUTATIONS: usize = 128;

/// Similarity cutoff for the MinHash near-duplicate check
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Similarity cutoff for the embedding-space duplicate check
pub const SEMANTIC_DUPLICATE_THRESHOLD: f64 = 0.92;

/// SHA-256 hex digest of lowercased, trimmed content
///
/// Identical normalized text always yields an identical hash.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.to_lowercase().trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Content-addressed hash for a chunk, including its position context
pub fn chunk_hash(chunk_text: &str, content_hash: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", content_hash, chunk_index, chunk_text).as_bytes());
    hex::encode(hasher.finalize())
}

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, collapse whitespace, strip punctuation
pub fn normalize_content(content: &str) -> String {
    let lowered = content.to_lowercase();
    let spaced = WHITESPACE.replace_all(&lowered, " ");
    NON_WORD.replace_all(&spaced, "").trim().to_string()
}

/// Build the set of n-word shingles from text
fn shingles(text: &str, n: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    let words: Vec<&str> = stripped.split_whitespace().collect();

    if words.len() < n {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(words.len() - n + 1);
    let mut seen = std::collections::HashSet::new();
    for window in words.windows(n) {
        let shingle = window.join(" ");
        if seen.insert(shingle.clone()) {
            out.push(shingle);
        }
    }
    out
}

/// Seeded 32-bit rolling hash (x31), matching across calls and processes
fn hash_with_seed(s: &str, seed: i32) -> u32 {
    let mut hash = seed;
    for c in s.chars() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}

/// MinHash signature over 3-word shingles
///
/// One entry per permutation: the minimum seeded hash over all
/// shingles. An empty shingle set yields all-zero entries.
pub fn min_hash_signature(content: &str, num_perm: usize) -> Vec<u32> {
    let shingle_set = shingles(content, 3);
    let mut signature = Vec::with_capacity(num_perm);

    for i in 0..num_perm {
        let seed = (i as i32).wrapping_mul(1000).wrapping_add(1);
        let min = shingle_set
            .iter()
            .map(|s| hash_with_seed(s, seed))
            .min()
            .unwrap_or(0);
        signature.push(min);
    }

    signature
}

/// Jaccard similarity estimate: fraction of agreeing signature positions
pub fn min_hash_similarity(sig1: &[u32], sig2: &[u32]) -> Result<f64> {
    if sig1.len() != sig2.len() {
        return Err(Error::SignatureLength {
            expected: sig1.len(),
            actual: sig2.len(),
        });
    }
    if sig1.is_empty() {
        return Ok(0.0);
    }

    let matches = sig1.iter().zip(sig2).filter(|(a, b)| a == b).count();
    Ok(matches as f64 / sig1.len() as f64)
}

/// Cosine similarity between two embedding vectors
pub fn cosine_similarity(vec1: &[f32], vec2: &[f32]) -> Result<f64> {
    if vec1.len() != vec2.len() {
        return Err(Error::DimensionMismatch {
            expected: vec1.len(),
            actual: vec2.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm1 = 0.0f64;
    let mut norm2 = 0.0f64;

    for (a, b) in vec1.iter().zip(vec2) {
        dot += (*a as f64) * (*b as f64);
        norm1 += (*a as f64) * (*a as f64);
        norm2 += (*b as f64) * (*b as f64);
    }

    if norm1 == 0.0 || norm2 == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm1.sqrt() * norm2.sqrt()))
}

/// Outcome of a similarity scan against existing items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearDuplicateCheck {
    pub is_duplicate: bool,
    /// Index of the most similar existing item, when one clears the
    /// threshold
    pub match_index: Option<usize>,
    pub similarity: f64,
}

impl NearDuplicateCheck {
    fn miss() -> Self {
        Self {
            is_duplicate: false,
            match_index: None,
            similarity: 0.0,
        }
    }
}

/// MinHash near-duplicate check against a corpus of signatures
///
/// Scans every signature and reports the best match, so the result is
/// deterministic in corpus content rather than corpus order.
pub fn is_near_duplicate(
    new_signature: &[u32],
    existing_signatures: &[Vec<u32>],
    threshold: f64,
) -> Result<NearDuplicateCheck> {
    let mut best: Option<(usize, f64)> = None;

    for (i, existing) in existing_signatures.iter().enumerate() {
        let similarity = min_hash_similarity(new_signature, existing)?;
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((i, similarity));
        }
    }

    match best {
        Some((index, similarity)) if similarity >= threshold => Ok(NearDuplicateCheck {
            is_duplicate: true,
            match_index: Some(index),
            similarity,
        }),
        _ => Ok(NearDuplicateCheck::miss()),
    }
}

/// Embedding-space duplicate check for content whose wording diverges
/// but meaning does not
pub fn is_semantic_duplicate(
    new_embedding: &[f32],
    existing_embeddings: &[Vec<f32>],
    threshold: f64,
) -> Result<NearDuplicateCheck> {
    let mut best: Option<(usize, f64)> = None;

    for (i, existing) in existing_embeddings.iter().enumerate() {
        let similarity = cosine_similarity(new_embedding, existing)?;
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((i, similarity));
        }
    }

    match best {
        Some((index, similarity)) if similarity >= threshold => Ok(NearDuplicateCheck {
            is_duplicate: true,
            match_index: Some(index),
            similarity,
        }),
        _ => Ok(NearDuplicateCheck::miss()),
    }
}

/// Options for the combined duplication check
#[derive(Debug, Clone)]
pub struct DeduplicationOptions {
    pub near_duplicate_threshold: f64,
    pub num_permutations: usize,
}

impl Default for DeduplicationOptions {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: NEAR_DUPLICATE_THRESHOLD,
            num_permutations: DEFAULT_NUM_PERMUTATIONS,
        }
    }
}

/// Combined exact + near duplication result
///
/// Carries the computed hash and signature so the caller can insert
/// them into the corpus for future comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationResult {
    pub is_exact_duplicate: bool,
    pub is_near_duplicate: bool,
    pub exact_hash: String,
    pub min_hash_signature: Vec<u32>,
    pub near_duplicate_similarity: f64,
}

/// Full duplication check: O(1) exact-hash lookup plus a linear
/// MinHash scan over existing signatures
///
/// The linear scan is O(corpus x permutations); acceptable at moderate
/// corpus sizes. LSH bucketing would be the next step for large corpora.
pub fn check_duplication(
    content: &str,
    existing_hashes: &std::collections::HashSet<String>,
    existing_signatures: &[Vec<u32>],
    options: &DeduplicationOptions,
) -> Result<DeduplicationResult> {
    let hash = content_hash(content);
    let signature = min_hash_signature(content, options.num_permutations);

    let is_exact = existing_hashes.contains(&hash);
    let near = is_near_duplicate(
        &signature,
        existing_signatures,
        options.near_duplicate_threshold,
    )?;

    Ok(DeduplicationResult {
        is_exact_duplicate: is_exact,
        is_near_duplicate: near.is_duplicate,
        exact_hash: hash,
        min_hash_signature: signature,
        near_duplicate_similarity: near.similarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn content_hash_is_deterministic_and_normalized() {
        let a = content_hash("Hello World");
        let b = content_hash("Hello World");
        let c = content_hash("  hello world  ");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, content_hash("hello worlds"));
    }

    #[test]
    fn chunk_hash_depends_on_position() {
        let parent = content_hash("doc");
        assert_ne!(chunk_hash("text", &parent, 0), chunk_hash("text", &parent, 1));
        assert_eq!(chunk_hash("text", &parent, 0), chunk_hash("text", &parent, 0));
    }

    #[test]
    fn min_hash_signature_is_stable() {
        let text = "the quick brown fox jumps over the lazy dog near the river bank";
        let a = min_hash_signature(text, 128);
        let b = min_hash_signature(text, 128);
        assert_eq!(a.len(), 128);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_yields_zero_signature() {
        let sig = min_hash_signature("", 16);
        assert_eq!(sig, vec![0u32; 16]);
        // Fewer than three words also yields no shingles
        let sig = min_hash_signature("two words", 16);
        assert_eq!(sig, vec![0u32; 16]);
    }

    #[test]
    fn identical_text_has_similarity_one() {
        let text = "community health services operate across the island every weekday morning";
        let a = min_hash_signature(text, 128);
        let b = min_hash_signature(text, 128);
        assert_eq!(min_hash_similarity(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn boilerplate_variation_stays_above_threshold() {
        let body = "The community centre offers youth programs, health outreach, \
                    cultural events and family support services throughout the year. \
                    Programs run weekly and are open to all residents of the island \
                    community with no cost to attend. Staff are locally employed."
            .repeat(3);
        let a = format!("{} Footer: contact us today.", body);
        let b = format!("{} Footer: follow us online.", body);

        let sig_a = min_hash_signature(&a, 128);
        let sig_b = min_hash_signature(&b, 128);
        let similarity = min_hash_similarity(&sig_a, &sig_b).unwrap();
        assert!(similarity >= 0.8, "similarity too low: {}", similarity);
    }

    #[test]
    fn unrelated_texts_have_near_zero_similarity() {
        let a = min_hash_signature(
            "quarterly financial projections indicate strong revenue growth in retail",
            128,
        );
        let b = min_hash_signature(
            "the wet season brings heavy rainfall to tropical coastal regions annually",
            128,
        );
        let similarity = min_hash_similarity(&a, &b).unwrap();
        assert!(similarity < 0.1, "similarity too high: {}", similarity);
    }

    #[test]
    fn mismatched_signature_lengths_error() {
        let a = vec![1u32; 64];
        let b = vec![1u32; 128];
        assert!(matches!(
            min_hash_similarity(&a, &b),
            Err(Error::SignatureLength { .. })
        ));
    }

    #[test]
    fn near_duplicate_reports_best_match() {
        let target = "community health services on the island run weekly clinics for families";
        let near = "community health services on the island run weekly clinics for everyone";
        let far = "a completely different sentence about financial market analysis trends";

        let sig = min_hash_signature(target, 128);
        let existing = vec![
            min_hash_signature(far, 128),
            min_hash_signature(near, 128),
            min_hash_signature(target, 128),
        ];

        let check = is_near_duplicate(&sig, &existing, 0.8).unwrap();
        assert!(check.is_duplicate);
        // Best match, not first match at or above threshold
        assert_eq!(check.match_index, Some(2));
        assert_eq!(check.similarity, 1.0);
    }

    #[test]
    fn near_duplicate_miss_below_threshold() {
        let sig = min_hash_signature("some entirely novel content about gardening tips", 128);
        let existing = vec![min_hash_signature(
            "unrelated industrial manufacturing process documentation",
            128,
        )];
        let check = is_near_duplicate(&sig, &existing, 0.8).unwrap();
        assert!(!check.is_duplicate);
        assert!(check.match_index.is_none());
        assert_eq!(check.similarity, 0.0);
    }

    #[test]
    fn cosine_similarity_basics() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![1.0f32, 0.0, 0.0];
        let c = vec![0.0f32, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&a, &c).unwrap()).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]).unwrap(), 0.0);
        assert!(matches!(
            cosine_similarity(&a, &[1.0, 0.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn semantic_duplicate_uses_higher_threshold() {
        let new = vec![1.0f32, 0.1, 0.0];
        let close = vec![1.0f32, 0.12, 0.0];
        let existing = vec![close];
        let check = is_semantic_duplicate(&new, &existing, 0.92).unwrap();
        assert!(check.is_duplicate);
        assert!(check.similarity > 0.99);
    }

    #[test]
    fn check_duplication_combines_levels() {
        let text = "the island community newsletter reports on local events every month";
        let mut hashes = HashSet::new();
        let signatures = vec![min_hash_signature(text, 128)];

        let first =
            check_duplication(text, &hashes, &signatures, &DeduplicationOptions::default())
                .unwrap();
        assert!(!first.is_exact_duplicate);
        assert!(first.is_near_duplicate);

        hashes.insert(first.exact_hash.clone());
        let second =
            check_duplication(text, &hashes, &signatures, &DeduplicationOptions::default())
                .unwrap();
        assert!(second.is_exact_duplicate);
        assert_eq!(second.exact_hash, first.exact_hash);
    }

    #[test]
    fn normalize_content_strips_punctuation_and_case() {
        assert_eq!(
            normalize_content("Hello,   World! It's   fine."),
            "hello world its fine"
        );
    }
}
