//! Boundary-aware overlapping text chunker.
//!
//! Splits document body text into [`Chunk`]s no longer than `max_chars`
//! characters, with a configured character overlap between consecutive
//! chunks. Cuts prefer sentence endings, then whitespace, and fall back to
//! a hard cut for single tokens longer than the limit.
//!
//! Chunking is deterministic: identical text and configuration always
//! produce identical boundaries, which keeps citations reproducible.
//! Offsets are byte offsets into the original text and always land on
//! UTF-8 character boundaries.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// A chunk's text together with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub offset: usize,
}

/// Split text into spans of at most `max_chars` characters with the given
/// character overlap. Requires `overlap < max_chars` (validated at startup).
///
/// Empty or whitespace-only input produces no spans.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<TextSpan> {
    debug_assert!(max_chars > 0 && overlap < max_chars);

    // (byte offset, char) for every character, so cuts stay on char boundaries.
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    let byte_at = |i: usize| -> usize {
        if i < n {
            chars[i].0
        } else {
            text.len()
        }
    };

    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < n {
        let hard_end = (start + max_chars).min(n);
        let cut = if hard_end == n {
            n
        } else {
            find_cut(&chars, start, hard_end, overlap)
        };

        let piece = &text[byte_at(start)..byte_at(cut)];
        if !piece.trim().is_empty() {
            spans.push(TextSpan {
                text: piece.to_string(),
                offset: byte_at(start),
            });
        }

        if cut == n {
            break;
        }
        // Step back by the overlap, but always make forward progress.
        start = cut.saturating_sub(overlap).max(start + 1);
    }

    spans
}

/// Pick the cut position (a char index; the chunk covers `[start, cut)`)
/// inside the window `(start, hard_end]`. Prefers the last sentence ending,
/// then the last whitespace; a single over-long token gets a hard cut.
///
/// Boundary cuts must clear the overlap region, otherwise the next window
/// (which starts `overlap` chars back) would land on the same boundary
/// again and stop advancing.
fn find_cut(chars: &[(usize, char)], start: usize, hard_end: usize, overlap: usize) -> usize {
    let min_cut = start + overlap + 1;
    let mut last_sentence = None;
    let mut last_space = None;

    for i in start..hard_end {
        let cut = i + 1;
        if cut < min_cut {
            continue;
        }
        let c = chars[i].1;
        if matches!(c, '.' | '!' | '?' | '\n') {
            last_sentence = Some(cut);
        } else if c.is_whitespace() {
            last_space = Some(cut);
        }
    }

    last_sentence.or(last_space).unwrap_or(hard_end)
}

/// Chunk a document's text into [`Chunk`] records with contiguous indices.
pub fn chunk_document(document_id: &str, text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    split_text(text, max_chars, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, span)| make_chunk(document_id, index, span))
        .collect()
}

fn make_chunk(document_id: &str, index: usize, span: TextSpan) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        hash: text_hash(&span.text),
        text: span.text,
        offset: span.offset,
    }
}

/// SHA-256 of a text, hex encoded.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_span() {
        let spans = split_text("Hello, world!", 100, 20);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello, world!");
        assert_eq!(spans[0].offset, 0);
    }

    #[test]
    fn test_empty_text_no_spans() {
        assert!(split_text("", 100, 20).is_empty());
        assert!(split_text("   \n\n  ", 100, 20).is_empty());
    }

    #[test]
    fn test_respects_max_chars() {
        let text = "word ".repeat(200);
        let spans = split_text(&text, 50, 10);
        assert!(spans.len() > 1);
        for span in &spans {
            assert!(span.text.chars().count() <= 50, "span too long: {:?}", span);
        }
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        let text = "A sentence here. Another one there. ".repeat(30);
        let spans = split_text(&text, 80, 20);
        for pair in spans.windows(2) {
            assert!(pair[1].offset > pair[0].offset);
        }
    }

    #[test]
    fn test_offsets_index_into_source() {
        let text = "First sentence. Second sentence follows here. Third one closes. ".repeat(10);
        for span in split_text(&text, 60, 15) {
            assert_eq!(&text[span.offset..span.offset + span.text.len()], span.text);
        }
    }

    #[test]
    fn test_consecutive_spans_overlap() {
        let text = "alpha beta gamma delta ".repeat(40);
        let spans = split_text(&text, 100, 30);
        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            let prev_end = pair[0].offset + pair[0].text.len();
            assert!(
                pair[1].offset < prev_end,
                "expected overlap between consecutive spans"
            );
        }
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = "Short opener. A second sentence that is a bit longer than the first one.";
        let spans = split_text(text, 40, 5);
        assert!(spans[0].text.trim_end().ends_with('.'));
    }

    #[test]
    fn test_hard_cut_for_long_token() {
        let text = "x".repeat(250);
        let spans = split_text(&text, 100, 10);
        assert!(spans.len() >= 3);
        assert_eq!(spans[0].text.len(), 100);
        assert_eq!(spans[1].offset, 90); // 100 - overlap
    }

    #[test]
    fn test_multibyte_text_cuts_on_char_boundaries() {
        let text = "Aprender é viver. Máquinas também aprendem, à sua maneira. ".repeat(20);
        let spans = split_text(&text, 70, 15);
        assert!(spans.len() > 1);
        for span in &spans {
            // Offsets must be valid slice boundaries
            assert!(text.is_char_boundary(span.offset));
            assert_eq!(&text[span.offset..span.offset + span.text.len()], span.text);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Machine Learning é uma subárea da IA. ".repeat(50);
        let a = split_text(&text, 120, 40);
        let b = split_text(&text, 120, 40);
        assert_eq!(a, b);

        let c1 = chunk_document("doc1", &text, 120, 40);
        let c2 = chunk_document("doc1", &text, 120, 40);
        assert_eq!(c1.len(), c2.len());
        for (x, y) in c1.iter().zip(c2.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.offset, y.offset);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.chunk_index, y.chunk_index);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_document("doc1", &text, 60, 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
        }
    }
}
