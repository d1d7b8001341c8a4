//! Extractive answer selection.
//!
//! The answer is one sentence of the retrieved context. The question picks a
//! cue family; the first context sentence containing one of the family's
//! markers wins, otherwise the context's first sentence is returned.

use crate::text::split_sentences;

pub const NO_ANSWER: &str =
    "I couldn't find a specific answer to your question in the loaded documents.";

/// (question triggers, sentence markers), checked in order. Only the first
/// family whose trigger matches is tried.
const CUE_FAMILIES: &[(&[&str], &[&str])] = &[
    (&["what is", "define", "definition"], &["is", "are", "defined", "refers"]),
    (&["how", "method", "approach"], &["method", "approach", "technique", "process"]),
    (&["result", "conclusion", "finding"], &["result", "conclusion", "found", "showed"]),
];

/// Selects an answer sentence from `context`. Matching is by lowercase
/// substring, so the marker `is` also matches inside words like "this".
pub fn select_answer(question: &str, context: &str) -> String {
    let q = question.to_lowercase();
    let sentences = split_sentences(context);

    let family = CUE_FAMILIES
        .iter()
        .find(|(triggers, _)| triggers.iter().any(|t| q.contains(t)));

    if let Some((_, markers)) = family {
        let hit = sentences.iter().find(|s| {
            let lower = s.to_lowercase();
            markers.iter().any(|m| lower.contains(m))
        });
        if let Some(sentence) = hit {
            return sentence.clone();
        }
    }

    sentences
        .into_iter()
        .next()
        .unwrap_or_else(|| NO_ANSWER.to_string())
}
