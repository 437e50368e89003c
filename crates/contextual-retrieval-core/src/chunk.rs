//! Paragraph-boundary text splitter with overlap.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries; drop blank paragraphs.
//! 2. Hard-split any paragraph longer than `max_chars` at the last
//!    whitespace before the limit (or exactly at the limit if there is none).
//! 3. Pack the resulting pieces greedily into chunks of at most
//!    `max_chars`, joined by `\n\n`.
//! 4. After a chunk is flushed, the next chunk starts with up to
//!    `overlap_chars` from the end of the previous one (word aligned), as
//!    long as the seed still leaves room for the next piece.
//!
//! Sizes are counted in `char`s. Whitespace-only text yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use contextual_retrieval_core::chunk::ParagraphSplitter;
//! use contextual_retrieval_core::traits::Splitter;
//!
//! let splitter = ParagraphSplitter::new(400, 200);
//! let chunks = splitter.split("Hello world.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use crate::traits::Splitter;

pub const DEFAULT_MAX_CHARS: usize = 400;
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParagraphSplitter {
    max_chars: usize,
    overlap_chars: usize,
}

impl ParagraphSplitter {
    /// `max_chars` is raised to at least 1 and `overlap_chars` capped below it.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }
}

impl Default for ParagraphSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS)
    }
}

impl Splitter for ParagraphSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let pieces: Vec<&str> = text
            .split(PARAGRAPH_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .flat_map(|p| hard_split(p, self.max_chars))
            .collect();

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            let would_be = if current.is_empty() {
                piece_len
            } else {
                current_len + 2 + piece_len
            };

            if would_be > self.max_chars && !current.is_empty() {
                let seed = overlap_tail(&current, self.overlap_chars).to_string();
                chunks.push(std::mem::take(&mut current));
                current_len = 0;

                let seed_len = char_len(&seed);
                if !seed.is_empty() && seed_len + 2 + piece_len <= self.max_chars {
                    current.push_str(&seed);
                    current_len = seed_len;
                }
            }

            if !current.is_empty() {
                current.push_str(PARAGRAPH_SEPARATOR);
                current_len += 2;
            }
            current.push_str(piece);
            current_len += piece_len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th char, or `s.len()` if `s` is shorter.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Break a paragraph into pieces of at most `max_chars`.
fn hard_split(paragraph: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = paragraph;

    while !remaining.is_empty() {
        if char_len(remaining) <= max_chars {
            pieces.push(remaining);
            break;
        }
        let limit = byte_offset(remaining, max_chars);
        let cut = remaining[..limit]
            .rfind(char::is_whitespace)
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);

        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[cut..].trim_start();
    }
    pieces
}

/// Up to `overlap` chars from the end of `chunk`, starting on a word.
fn overlap_tail(chunk: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    let total = char_len(chunk);
    if total <= overlap {
        return chunk.trim();
    }
    let start = byte_offset(chunk, total - overlap);
    let tail = &chunk[start..];
    let starts_mid_word = !chunk[..start].ends_with(char::is_whitespace)
        && !tail.starts_with(char::is_whitespace);
    let tail = if starts_mid_word {
        match tail.find(char::is_whitespace) {
            Some(pos) => &tail[pos..],
            None => "",
        }
    } else {
        tail
    };
    tail.trim()
}
