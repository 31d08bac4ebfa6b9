//! Recursive character text splitter.
//!
//! Splits document text into overlapping chunks of at most `chunk_size`
//! characters. Separators are tried in order of decreasing granularity:
//! paragraph (`\n\n`), line (`\n`), word (` `) and finally single
//! characters. A piece that is still too long is split again with the next
//! separator. Adjacent pieces are then merged back up to `chunk_size`, and
//! each new chunk starts with up to `chunk_overlap` characters carried over
//! from the end of the previous one.
//!
//! Lengths are counted in characters, so a chunk never ends inside a
//! multi-byte UTF-8 sequence.

use std::collections::VecDeque;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let index = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(index).copied().unwrap_or("");
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + joiner + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join(&window, separator) {
                    chunks.push(chunk);
                }
                // Shrink to the overlap and make room for the next piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + sep_len + len > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let joined = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + joined);
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            total += joiner + len;
            window.push_back(piece);
        }

        if let Some(chunk) = join(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
