//! Word-granularity sliding-window chunker.
//!
//! Long texts are split into spans of `chunk_size` words, consecutive spans
//! sharing `overlap` words. Words are maximal runs of non-whitespace and are
//! re-joined with single spaces.

use quarry_core::error::{QuarryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Requires `chunk_size > 0` and `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QuarryError::InvalidParameters(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(QuarryError::InvalidParameters(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, overlapping chunks.
    ///
    /// The last chunk may be shorter than `chunk_size`. Empty or
    /// whitespace-only input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.windows(words.len())
            .into_iter()
            .map(|(start, end)| words[start..end].join(" "))
            .collect()
    }

    /// Word ranges `[start, end)` covered by each chunk of an `n`-word text.
    pub fn windows(&self, n: usize) -> Vec<(usize, usize)> {
        let step = self.chunk_size - self.overlap;
        let mut ranges = Vec::new();
        let mut start = 0;
        while start < n {
            let end = (start + self.chunk_size).min(n);
            ranges.push((start, end));
            if end == n {
                break;
            }
            start += step;
        }
        ranges
    }
}

/// Validate parameters and split in one call.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(Chunker::new(chunk_size, overlap)?.split(text))
}
