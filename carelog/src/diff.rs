//! Word-level diff between two revisions of a log
//!
//! Texts are split into alternating runs of whitespace and non-whitespace so
//! that joining the tokens gives back the original text. Tokens of the new
//! text are matched greedily against the earliest unused equal token of the
//! old text. Old tokens left unmatched are reported first as one removed
//! block, followed by the new text with additions inline. This is not a
//! minimal edit script; it reads well for appends, insertions and deletions,
//! which is how notes are usually edited.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Unchanged,
    Added,
    Removed,
}

/// A labelled span of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    pub text: String,
    pub status: SegmentStatus,
}

impl DiffSegment {
    fn new(text: &str, status: SegmentStatus) -> Self {
        Self {
            text: text.to_string(),
            status,
        }
    }

    pub fn is_change(&self) -> bool {
        self.status != SegmentStatus::Unchanged
    }
}

/// Split into maximal runs of whitespace and non-whitespace
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut previous: Option<bool> = None;

    for (i, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        if previous.is_some_and(|was_space| was_space != is_space) {
            tokens.push(&text[start..i]);
            start = i;
        }
        previous = Some(is_space);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Compare two snapshots token by token
pub fn diff(old: &str, new: &str) -> Vec<DiffSegment> {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);

    let mut positions: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (index, token) in old_tokens.iter().enumerate() {
        positions.entry(*token).or_default().push_back(index);
    }

    let mut matched = vec![false; old_tokens.len()];
    let mut current = Vec::with_capacity(new_tokens.len());

    for token in &new_tokens {
        let status = match positions.get_mut(token).and_then(VecDeque::pop_front) {
            Some(index) => {
                matched[index] = true;
                SegmentStatus::Unchanged
            }
            None => SegmentStatus::Added,
        };
        current.push(DiffSegment::new(token, status));
    }

    let mut segments: Vec<DiffSegment> = old_tokens
        .iter()
        .zip(&matched)
        .filter(|(_, used)| !**used)
        .map(|(token, _)| DiffSegment::new(token, SegmentStatus::Removed))
        .collect();

    segments.extend(current);
    segments
}

/// Plain-text rendering in `[-removed-]` / `{+added+}` notation
pub fn render_word_diff(segments: &[DiffSegment]) -> String {
    let mut out = String::new();

    for segment in segments {
        match segment.status {
            SegmentStatus::Unchanged => out.push_str(&segment.text),
            SegmentStatus::Added => {
                out.push_str("{+");
                out.push_str(&segment.text);
                out.push_str("+}");
            }
            SegmentStatus::Removed => {
                out.push_str("[-");
                out.push_str(&segment.text);
                out.push_str("-]");
            }
        }
    }

    out
}
