//! Fixed-window text chunking with overlap
//!
//! Chunks are exact grapheme windows so that concatenating them with each
//! chunk's leading overlap removed reproduces the input text byte for byte.

use unicode_segmentation::UnicodeSegmentation;

/// Splits text into overlapping fixed-size chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. Overlap is clamped below the chunk size so the
    /// window always advances.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into ordered chunks. Empty input yields zero chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every grapheme, so windows never cut a cluster.
        let offsets: Vec<usize> = text.grapheme_indices(true).map(|(i, _)| i).collect();
        let total = offsets.len();
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            let byte_start = offsets[start];
            let byte_end = if end == total {
                text.len()
            } else {
                offsets[end]
            };
            chunks.push(text[byte_start..byte_end].to_string());
            if end == total {
                break;
            }
            start += step;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicode_segmentation::UnicodeSegmentation;

    /// Rebuild the original text by stripping each chunk's leading overlap
    fn reassemble(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                let byte_skip = chunk
                    .grapheme_indices(true)
                    .nth(overlap)
                    .map(|(b, _)| b)
                    .unwrap_or(chunk.len());
                out.push_str(&chunk[byte_skip..]);
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_zero_chunks() {
        let chunker = TextChunker::new(1536, 200);
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunker = TextChunker::new(1536, 200);
        let chunks = chunker.split("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn round_trip_reconstructs_original() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(200);
        for (size, overlap) in [(1536, 200), (100, 20), (64, 0), (10, 9)] {
            let chunker = TextChunker::new(size, overlap);
            let chunks = chunker.split(&text);
            assert_eq!(reassemble(&chunks, chunker.overlap()), text);
        }
    }

    #[test]
    fn round_trip_with_multibyte_text() {
        let text = "Växthusgaser: 100 ton CO₂e – scope 1 för året. ".repeat(80);
        let chunker = TextChunker::new(100, 25);
        let chunks = chunker.split(&text);
        assert_eq!(reassemble(&chunks, 25), text);
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text: String = ('a'..='z').cycle().take(5000).collect();
        let chunker = TextChunker::new(1536, 200);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(200).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            let head: String = pair[1].chars().take(200).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn chunks_respect_size_bound() {
        let text = "x".repeat(10_000);
        let chunker = TextChunker::new(1536, 200);
        for chunk in chunker.split(&text) {
            assert!(chunk.chars().count() <= 1536);
        }
    }
}
