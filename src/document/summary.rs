//! Extractive summaries and frequency keywords.

use std::collections::HashMap;

use crate::text::{is_stop_word, words};

/// Picks up to `max_sentences` sentences by position and length, returned in
/// document order.
///
/// Scoring: +2 for sentences in the first 30%, +1 in the last 30%, +1 for a
/// length strictly between 50 and 200 characters. Ranking is by score and
/// then by position, both descending, so among equal scores the later
/// sentence wins. Texts with no more than `max_sentences` sentences are
/// returned unchanged.
pub fn summarize(text: &str, sentences: &[String], max_sentences: usize) -> String {
    if sentences.len() <= max_sentences {
        return text.to_string();
    }

    let n = sentences.len() as f64;
    let mut scored: Vec<(u32, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let pos = i as f64;
            let len = s.chars().count();
            let mut score = 0;
            if pos < n * 0.3 {
                score += 2;
            }
            if pos > n * 0.7 {
                score += 1;
            }
            if len > 50 && len < 200 {
                score += 1;
            }
            (score, i)
        })
        .collect();

    scored.sort_by(|a, b| b.cmp(a));
    let mut picked: Vec<usize> = scored.iter().take(max_sentences).map(|(_, i)| *i).collect();
    picked.sort_unstable();

    picked
        .iter()
        .map(|&i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Top `top_k` words by frequency: lowercase, alphabetic, longer than three
/// characters, and not a stop-word. Ties keep first-occurrence order.
pub fn extract_keywords(text: &str, top_k: usize) -> Vec<String> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for word in words(text) {
        if word.chars().count() <= 3 || !word.chars().all(char::is_alphabetic) || is_stop_word(&word) {
            continue;
        }
        match index.get(&word) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(word.clone(), counts.len());
                counts.push((word, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(top_k).map(|(w, _)| w).collect()
}
