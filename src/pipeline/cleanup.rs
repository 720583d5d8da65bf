//! Transcript cleanup: deterministic rules first, then a language-model
//! smoothing pass that may only rearrange or drop words, never add them.

use super::services::GenerationResponse;
use anyhow::{bail, Result};
use std::collections::HashSet;

pub const CLEANUP_INSTRUCTION: &str = "Rewrite this transcript for readability. \
Fix capitalization and punctuation and drop false starts. Keep the speaker's intent \
even if the grammar stays imperfect. Do not add any word that is not already in the text.";

const FILLER_WORDS: &[&str] = &[
    "um", "umm", "uh", "uhh", "uhm", "er", "erm", "ah", "hmm", "mm",
];

/// Longest phrase (in words) checked for immediate repetition
const MAX_REPEATED_PHRASE: usize = 4;

/// Remove filler words, collapse stuttered words and phrases, normalize
/// whitespace and sentence capitalization.
pub fn apply_rules(raw: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for token in raw.split_whitespace() {
        if is_filler(token) {
            // Keep sentence-ending punctuation the filler was carrying
            if let (Some(end), Some(prev)) = (terminal_punctuation(token), kept.last_mut()) {
                if terminal_punctuation(prev).is_none() {
                    prev.push(end);
                }
            }
            continue;
        }
        kept.push(token.to_string());
        collapse_tail(&mut kept);
    }

    capitalize_sentences(&mut kept);
    kept.join(" ")
}

/// Words in `candidate` that never occur in `source`
pub fn introduced_words(source: &str, candidate: &str) -> Vec<String> {
    let vocabulary: HashSet<String> = words(source).collect();
    let mut introduced: Vec<String> = words(candidate)
        .filter(|w| !vocabulary.contains(w))
        .collect();
    introduced.dedup();
    introduced
}

/// Accept a smoothing response only if it is non-empty and adds nothing
/// absent from the raw transcript.
pub fn accept_smoothed(raw: &str, response: &GenerationResponse) -> Result<String> {
    let text = response.text.trim();
    if text.is_empty() {
        bail!("language model returned an empty cleanup");
    }

    let introduced = introduced_words(raw, text);
    if !introduced.is_empty() {
        bail!(
            "cleanup introduced words absent from the transcript: {}",
            introduced.join(", ")
        );
    }

    Ok(text.to_string())
}

pub fn word_count(text: &str) -> u32 {
    words(text).count() as u32
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn normalize(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_filler(token: &str) -> bool {
    let word = normalize(token);
    FILLER_WORDS.contains(&word.as_str())
}

fn terminal_punctuation(token: &str) -> Option<char> {
    token.chars().last().filter(|c| matches!(c, '.' | '?' | '!'))
}

/// Drop the newest copy of any phrase that immediately repeats itself
fn collapse_tail(tokens: &mut Vec<String>) {
    loop {
        let len = tokens.len();
        let repeated = (1..=MAX_REPEATED_PHRASE).find(|&n| {
            len >= 2 * n
                && tokens[len - 2 * n..len - n]
                    .iter()
                    .zip(&tokens[len - n..])
                    .all(|(a, b)| normalize(a) == normalize(b) && !normalize(a).is_empty())
        });

        match repeated {
            Some(n) => tokens.truncate(len - n),
            None => break,
        }
    }
}

fn capitalize_sentences(tokens: &mut [String]) {
    let mut sentence_start = true;
    for token in tokens.iter_mut() {
        if sentence_start {
            let mut chars = token.chars();
            if let Some(first) = chars.next() {
                *token = first.to_uppercase().chain(chars).collect();
            }
        }
        sentence_start = terminal_punctuation(token).is_some();
    }
}
