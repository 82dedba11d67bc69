//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Chunk text into overlapping character windows.
///
/// Each window starts `overlap` characters before the previous one ended.
/// Windows are trimmed and blank ones dropped; positions count the kept
/// chunks. Windows may cut through words and sentences.
pub fn chunk_text(source: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkCandidate> {
    if text.trim().is_empty() || chunk_size == 0 {
        return vec![];
    }

    // Byte offset of every char, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let step = if overlap < chunk_size {
        chunk_size - overlap
    } else {
        chunk_size
    };

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(char_count);
        let window = text[bounds[start]..bounds[end]].trim();

        if !window.is_empty() {
            chunks.push(ChunkCandidate {
                source: source.to_string(),
                position: chunks.len(),
                text: window.to_string(),
            });
        }

        if end == char_count {
            break;
        }
        start += step;
    }

    tracing::debug!(
        "Chunked {} into {} chunks (size: {}, overlap: {})",
        source,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}
