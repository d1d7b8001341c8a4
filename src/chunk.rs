//! Sentence-packing text chunker.
//!
//! Splits cleaned document text into [`Chunk`]s of roughly `target_chars`
//! characters. Sentences are never split; a chunk is closed when the next
//! sentence would push it to the budget, and the following chunk is seeded
//! with the last few sentences of the closed one so retrieval keeps context
//! across the boundary.
//!
//! # Algorithm
//!
//! 1. Split the text into sentences.
//! 2. Append each sentence while `len(chunk) + len(sentence) < target_chars`.
//! 3. Otherwise close the chunk and start a new one from the trailing
//!    `overlap_chars / 50` sentences (only when the closed chunk holds more
//!    sentences than that) followed by the current sentence.
//! 4. Flush the final chunk.
//!
//! Lengths are measured in characters, including the single space that
//! joins sentences.

use crate::models::Chunk;
use crate::text::split_sentences;

/// Characters of overlap that buy one carried-over sentence.
const CHARS_PER_OVERLAP_SENTENCE: usize = 50;

/// Chunks `text` and returns chunks with contiguous ids starting at 0.
///
/// Empty text yields no chunks.
pub fn chunk_text(text: &str, target_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    chunk_sentences(&split_sentences(text), target_chars, overlap_chars)
}

/// Chunks an already-split sentence list.
pub fn chunk_sentences(sentences: &[String], target_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let carry = overlap_chars / CHARS_PER_OVERLAP_SENTENCE;
    let mut chunks = Vec::new();

    // Current chunk as a sentence range plus its rendered length, which
    // includes the leading separator the first sentence is appended with.
    let mut first = 0usize;
    let mut count = 0usize;
    let mut overlap = 0usize;
    let mut len = 0usize;

    for (idx, sentence) in sentences.iter().enumerate() {
        let sentence_len = sentence.chars().count();
        if len + sentence_len < target_chars {
            len += 1 + sentence_len;
            count += 1;
            continue;
        }

        if count > 0 {
            chunks.push(make_chunk(chunks.len(), sentences, first, count, overlap));
        }

        let carried = if carry > 0 && count > carry { carry } else { 0 };
        first = idx - carried;
        count = carried + 1;
        overlap = carried;
        // Seeded chunks have no leading separator: "a b" + " " + sentence.
        len = if carried == 0 {
            1 + sentence_len
        } else {
            sentences[first..idx]
                .iter()
                .map(|s| s.chars().count() + 1)
                .sum::<usize>()
                + sentence_len
        };
    }

    if count > 0 {
        chunks.push(make_chunk(chunks.len(), sentences, first, count, overlap));
    }

    chunks
}

fn make_chunk(
    chunk_id: usize,
    sentences: &[String],
    first: usize,
    count: usize,
    overlap: usize,
) -> Chunk {
    Chunk {
        chunk_id,
        text: sentences[first..first + count].join(" "),
        sentence_count: count,
        first_sentence: first,
        overlap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(n: usize, len: usize) -> String {
        let head = format!("Sentence {} ", n);
        let pad = len.saturating_sub(head.len() + 1);
        format!("{}{}.", head, "x".repeat(pad))
    }

    fn doc(n: usize, len: usize) -> String {
        (0..n).map(|i| sentence(i, len)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("Hello there. General Kenobi.", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, 0);
        assert_eq!(chunks[0].text, "Hello there. General Kenobi.");
        assert_eq!(chunks[0].sentence_count, 2);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 500, 50).is_empty());
    }

    #[test]
    fn closes_chunk_and_carries_one_sentence() {
        // Each sentence is 100 chars; three fit under 500 with separators,
        // the fifth would overflow.
        let chunks = chunk_text(&doc(6, 100), 500, 50);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sentence_count, 4);
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[1].first_sentence, 3);
        assert_eq!(chunks[1].overlap, 1);
        assert!(chunks[1].text.starts_with("Sentence 3 "));
    }

    #[test]
    fn zero_overlap_carries_nothing() {
        let chunks = chunk_text(&doc(6, 100), 500, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].first_sentence, 4);
        assert_eq!(chunks[1].overlap, 0);
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let text = format!("{} {} {}", sentence(0, 40), sentence(1, 900), sentence(2, 40));
        let chunks = chunk_text(&text, 500, 50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].sentence_count, 1);
        // A single-sentence chunk has nothing to carry over.
        assert_eq!(chunks[2].overlap, 0);
    }

    #[test]
    fn ids_contiguous_and_every_sentence_covered() {
        let text = doc(60, 90);
        let sentences = split_sentences(&text);
        let chunks = chunk_text(&text, 500, 50);

        let mut next_uncovered = 0usize;
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, i);
            let fresh_start = c.first_sentence + c.overlap;
            assert_eq!(fresh_start, next_uncovered, "gap before chunk {}", i);
            let rebuilt: Vec<String> = split_sentences(&c.text);
            assert_eq!(rebuilt, sentences[c.first_sentence..c.first_sentence + c.sentence_count]);
            next_uncovered = c.first_sentence + c.sentence_count;
        }
        assert_eq!(next_uncovered, sentences.len());
    }

    #[test]
    fn deterministic() {
        let text = doc(25, 120);
        let a = chunk_text(&text, 500, 50);
        let b = chunk_text(&text, 500, 50);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.chunk_id, y.chunk_id);
        }
    }
}
