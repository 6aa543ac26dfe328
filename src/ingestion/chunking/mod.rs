#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{QaError, Result};

/// A contiguous slice of a source document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Derived from the start offset; unique within one document only
    pub id: String,
    pub text: String,
    /// Inclusive character offset into the source text
    pub start_offset: usize,
    /// Exclusive character offset into the source text
    pub end_offset: usize,
}

impl Chunk {
    #[inline]
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration for sliding-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks; must be smaller than `chunk_size`
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(QaError::Validation(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(QaError::Validation(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive chunks
    #[inline]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split text into overlapping fixed-size windows.
///
/// Windows start at offset 0 and advance by `chunk_size - overlap` characters;
/// the last window is the first one whose end reaches the end of the text and
/// may be shorter than `chunk_size`. Empty text yields no chunks.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig {
        chunk_size,
        overlap,
    };
    config.validate()?;

    // Byte position of every character boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(char_count.div_ceil(config.stride()));
    let mut offset = 0;

    while offset < char_count {
        let end = (offset + chunk_size).min(char_count);
        let slice = text
            .get(boundaries[offset]..boundaries[end])
            .unwrap_or_default();

        chunks.push(Chunk {
            id: chunk_id(offset),
            text: slice.to_string(),
            start_offset: offset,
            end_offset: end,
        });

        if end == char_count {
            break;
        }
        offset += config.stride();
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        char_count,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Chunk text using a [`ChunkingConfig`]
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    chunk_text(text, config.chunk_size, config.overlap)
}

/// Identifier of the chunk starting at `offset`
#[inline]
pub fn chunk_id(offset: usize) -> String {
    format!("chunk_{}", offset)
}
