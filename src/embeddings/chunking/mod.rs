#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::language::Language;

/// Characters of overlap approximated by one carried-over word
const OVERLAP_CHARS_PER_WORD: usize = 10;

/// Configuration for knowledge-base chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap target in characters, carried over as roughly `chunk_overlap / 10` words
    pub chunk_overlap: usize,
    /// Default language for documents that don't specify one
    pub language: Language,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            language: Language::Ja,
        }
    }
}

/// Split raw document text into overlapping chunks sized for embedding.
///
/// Sentences are accumulated greedily until the next one would push the buffer
/// past `chunk_size` characters. A single sentence longer than `chunk_size` is
/// kept whole as its own oversized chunk. Each flushed chunk seeds the next
/// buffer with its trailing `chunk_overlap / 10` whole words. Words are
/// whitespace-delimited, so a space-less Japanese chunk is carried forward whole.
#[inline]
pub fn chunk_text(
    raw_text: &str,
    language: Language,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let policy = language.policy();
    let sentences = policy.split_sentences(raw_text);
    let overlap_words = chunk_overlap / OVERLAP_CHARS_PER_WORD;

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();
        let joiner = if buffer.is_empty() {
            ""
        } else {
            policy.sentence_joiner
        };
        let projected = buffer_chars + joiner.chars().count() + sentence_chars;

        if projected > chunk_size && !buffer.is_empty() {
            let overlap = overlap_tail(&buffer, overlap_words);
            chunks.push(std::mem::take(&mut buffer));

            if !overlap.is_empty() {
                buffer.push_str(&overlap);
                buffer.push_str(policy.sentence_joiner);
            }
            buffer.push_str(sentence);
        } else {
            buffer.push_str(joiner);
            buffer.push_str(sentence);
        }
        buffer_chars = buffer.chars().count();
    }

    if !buffer.trim().is_empty() {
        chunks.push(buffer);
    }

    debug!(
        "Chunked {} chars of {} text into {} chunks",
        raw_text.chars().count(),
        language,
        chunks.len()
    );

    chunks
}

/// Trailing words of a flushed chunk used to seed the next one
fn overlap_tail(buffer: &str, word_count: usize) -> String {
    if word_count == 0 {
        return String::new();
    }

    let words: Vec<&str> = buffer.split_whitespace().collect();
    let start = words.len().saturating_sub(word_count);
    words[start..].join(" ")
}
