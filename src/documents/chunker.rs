//! Document chunking strategies.
//!
//! Provides the `Chunker` trait and the recursive character splitter used
//! for notices and service descriptions.

use std::collections::VecDeque;

use super::config::{ChunkingConfig, ChunkingStrategy};

/// Separators tried in order: paragraphs, lines, words, characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A raw chunk before being assigned IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// The text content of this chunk.
    pub content: String,
}

impl RawChunk {
    pub fn new(content: String) -> Self {
        Self { content }
    }

    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split document content into chunks.
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;
}

/// Pick the chunker implementation for a strategy tag.
pub fn chunker_for(strategy: ChunkingStrategy) -> Box<dyn Chunker> {
    match strategy {
        ChunkingStrategy::Recursive => Box::new(RecursiveChunker::new()),
    }
}

/// Recursive character chunker.
///
/// Algorithm:
/// 1. Split on the coarsest separator present in the text
/// 2. Pieces that still exceed `chunk_size` are split with the next separator
/// 3. Adjacent small pieces are merged greedily up to `chunk_size`
/// 4. Each new chunk starts with trailing pieces of the previous one, up to
///    `chunk_overlap` characters
///
/// Sizes are measured in characters, not bytes.
#[derive(Debug, Default)]
pub struct RecursiveChunker;

impl RecursiveChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        split_recursive(
            content,
            &SEPARATORS,
            config.chunk_size.max(1),
            config.chunk_overlap,
        )
        .into_iter()
        .map(RawChunk::new)
        .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    // "" always matches, so a separator is always found while it is in the list.
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len(), ""));
    let finer = separators.get(index + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|p| !p.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, size, overlap));
            pending.clear();
        }

        if finer.is_empty() {
            push_trimmed(&mut chunks, piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, size, overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, size, overlap));
    }

    chunks
}

/// Merge pieces into chunks of at most `size` characters with overlap.
fn merge_pieces(pieces: &[&str], separator: &str, size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    // Character length of the window joined with separators.
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        let joined = if window.is_empty() { 0 } else { sep_len };

        if !window.is_empty() && total + joined + len > size {
            push_window(&mut chunks, &window, separator);

            // Keep at most `overlap` characters, and leave room for the new piece.
            while total > overlap || (total > 0 && total + sep_len + len > size) {
                let Some((_, first_len)) = window.pop_front() else {
                    break;
                };
                total -= first_len;
                if !window.is_empty() {
                    total -= sep_len;
                }
            }
        }

        if !window.is_empty() {
            total += sep_len;
        }
        total += len;
        window.push_back((piece, len));
    }

    push_window(&mut chunks, &window, separator);
    chunks
}

fn push_window(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    push_trimmed(chunks, joined);
}

fn push_trimmed(chunks: &mut Vec<String>, text: String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap)
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_content() {
        let chunker = RecursiveChunker::new();
        assert!(chunker.chunk("", &config(800, 200)).is_empty());
        assert!(chunker.chunk("  \n\n  ", &config(800, 200)).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = RecursiveChunker::new();
        let content = "Library hours are 9 to 6, Monday through Friday.";
        let chunks = chunker.chunk(content, &config(800, 200));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, content);
    }

    #[test]
    fn test_paragraphs_are_merged_when_they_fit() {
        let chunker = RecursiveChunker::new();
        let content = "First paragraph.\n\nSecond paragraph.";
        let chunks = chunker.chunk(content, &config(100, 10));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, content);
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let chunker = RecursiveChunker::new();
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let content = format!("{first}\n\n{second}");
        let chunks = chunker.chunk(&content, &config(100, 0));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, first);
        assert_eq!(chunks[1].content, second);
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let chunker = RecursiveChunker::new();
        let content = format!(
            "{}\n\n{}\nshort line\n{}",
            numbered_words(120),
            "x".repeat(333),
            numbered_words(40)
        );
        let cfg = config(50, 20);
        let chunks = chunker.chunk(&content, &cfg);

        assert!(chunks.len() > 5);
        for chunk in &chunks {
            assert!(
                chunk.char_count() <= cfg.chunk_size,
                "chunk too long: {}",
                chunk.char_count()
            );
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let chunker = RecursiveChunker::new();
        let content = numbered_words(200);
        let chunks = chunker.chunk(&content, &config(60, 20));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let previous: HashSet<&str> = pair[0].content.split_whitespace().collect();
            let first_next = pair[1].content.split_whitespace().next().unwrap();
            assert!(
                previous.contains(first_next),
                "'{first_next}' should be carried over from the previous chunk"
            );
        }
    }

    #[test]
    fn test_no_words_lost() {
        let chunker = RecursiveChunker::new();
        let content = numbered_words(150);
        let chunks = chunker.chunk(&content, &config(45, 10));

        let seen: HashSet<&str> = chunks
            .iter()
            .flat_map(|c| c.content.split_whitespace())
            .collect();
        for word in content.split_whitespace() {
            assert!(seen.contains(word), "missing {word}");
        }
    }

    #[test]
    fn test_multibyte_text_split_by_chars() {
        let chunker = RecursiveChunker::new();
        let content = "도서관".repeat(50); // 150 chars, no separators
        let chunks = chunker.chunk(&content, &config(40, 10));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.char_count() <= 40);
        }
        assert!(content.starts_with(&chunks[0].content));
    }

    #[test]
    fn test_deterministic_boundaries() {
        let chunker = RecursiveChunker::new();
        let content = format!("{}\n\n{}", numbered_words(90), numbered_words(70));
        let cfg = config(80, 25);

        assert_eq!(chunker.chunk(&content, &cfg), chunker.chunk(&content, &cfg));
    }
}
