//! Long-form text segmentation.
//!
//! Turns one block of user text into an ordered list of segments, each small
//! enough for a single synthesis call. Two policies:
//!
//! * **Explicit**: the text contains the separator (`|` by default): split
//!   strictly on it and do nothing else. Lets a user place every boundary.
//! * **Automatic**: split at sentence boundaries and recombine short
//!   sentences until a segment reaches `desired_length` characters, never
//!   letting one grow past `max_length`.
//!
//! Lengths are counted in characters, not bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Separator that switches segmentation to the explicit policy.
pub const DEFAULT_SEPARATOR: char = '|';

/// Characters a forced split may land on when no sentence boundary fits.
const SOFT_BOUNDARIES: &[char] = &['!', '?', '.', ',', '\n', ' '];

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_CURLY_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{201C}\u{201D}]").unwrap());

/// One entry of the ordered segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Zero-based position in the list.
    pub index: usize,
    pub text: String,
}

/// Which policy a piece of text is segmented with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Explicit,
    Automatic,
}

/// Length targets and separator for the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// A segment is committed at the first sentence boundary at or past this length.
    pub desired_length: usize,
    /// No automatic segment is longer than this.
    pub max_length: usize,
    pub separator: char,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { desired_length: 200, max_length: 300, separator: DEFAULT_SEPARATOR }
    }
}

/// Stateless text splitter; see the module docs.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn policy_for(&self, text: &str) -> Policy {
        if text.contains(self.config.separator) {
            Policy::Explicit
        } else {
            Policy::Automatic
        }
    }

    /// Split `text` into ordered, non-empty segments.
    ///
    /// Fails with [`GenerationError::EmptyText`] when nothing speakable is
    /// left, e.g. for `"|||"` or `"..."`.
    pub fn split(&self, text: &str) -> Result<Vec<TextSegment>, GenerationError> {
        let pieces = match self.policy_for(text) {
            Policy::Explicit => split_explicit(text, self.config.separator),
            Policy::Automatic => {
                split_and_recombine(text, self.config.desired_length, self.config.max_length)
            }
        };
        if pieces.is_empty() {
            return Err(GenerationError::EmptyText);
        }
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSegment { index, text })
            .collect())
    }
}

fn split_explicit(text: &str, separator: char) -> Vec<String> {
    text.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collapse whitespace runs (newlines included) to one space and replace
/// curly double quotes with straight ones.
pub fn normalize(text: &str) -> String {
    let text = RE_WHITESPACE.replace_all(text, " ");
    RE_CURLY_QUOTES.replace_all(&text, "\"").into_owned()
}

/// Automatic policy: sentence-aware split with recombination.
///
/// Lengths are clamped so every committed segment holds at least one
/// character: `desired_length >= 1` and `max_length >= desired_length`.
pub fn split_and_recombine(text: &str, desired_length: usize, max_length: usize) -> Vec<String> {
    let desired_length = desired_length.max(1);
    let max_length = max_length.max(desired_length);
    let chars: Vec<char> = normalize(text).chars().collect();
    let mut walker = Walker::new(&chars);

    while walker.next < chars.len() {
        let c = walker.advance();

        if walker.current.len() >= max_length {
            match walker.split_points.last().copied() {
                // At least one whole sentence and past half the target: rewind to it.
                Some(split) if walker.current.len() * 2 > desired_length => {
                    while walker.next > split {
                        walker.retreat();
                    }
                }
                // Otherwise back off to the nearest word or clause edge.
                _ => {
                    while walker.current.len() > desired_length
                        && walker.current.last().is_some_and(|c| !SOFT_BOUNDARIES.contains(c))
                    {
                        walker.retreat();
                    }
                }
            }
            walker.commit();
        } else if !walker.in_quote && is_sentence_end(c, walker.peek(1)) {
            while walker.current.len() < max_length
                && matches!(walker.peek(1), Some('!' | '?' | '.'))
            {
                walker.advance();
            }
            walker.split_points.push(walker.next);
            if walker.current.len() >= desired_length {
                walker.commit();
            }
        } else if walker.in_quote && walker.peek(1) == Some('"') && is_gap(walker.peek(2)) {
            // A closing quote followed by a space ends a sentence too.
            for _ in 0..2 {
                if walker.next < chars.len() {
                    walker.advance();
                }
            }
            walker.split_points.push(walker.next);
        }
    }
    walker.commit();

    walker
        .out
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !is_only_punctuation(s))
        .collect()
}

fn is_sentence_end(c: char, next: Option<char>) -> bool {
    matches!(c, '!' | '?' | '\n') || (c == '.' && is_gap(next))
}

fn is_gap(c: Option<char>) -> bool {
    matches!(c, None | Some(' ' | '\n'))
}

fn is_only_punctuation(s: &str) -> bool {
    s.chars().all(|c| c.is_whitespace() || ".,;:!?".contains(c))
}

/// Cursor over the normalized text, holding the segment being built.
struct Walker<'a> {
    chars: &'a [char],
    /// Index of the next unread character.
    next: usize,
    current: Vec<char>,
    in_quote: bool,
    /// Cursor positions just past each sentence boundary in `current`.
    split_points: Vec<usize>,
    out: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(chars: &'a [char]) -> Self {
        Self {
            chars,
            next: 0,
            current: Vec::new(),
            in_quote: false,
            split_points: Vec::new(),
            out: Vec::new(),
        }
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.next];
        self.next += 1;
        self.current.push(c);
        if c == '"' {
            self.in_quote = !self.in_quote;
        }
        c
    }

    fn retreat(&mut self) {
        if let Some(c) = self.current.pop() {
            self.next -= 1;
            if c == '"' {
                self.in_quote = !self.in_quote;
            }
        }
    }

    /// Character `delta` places after the last consumed one.
    fn peek(&self, delta: usize) -> Option<char> {
        (self.next + delta).checked_sub(1).and_then(|i| self.chars.get(i).copied())
    }

    fn commit(&mut self) {
        self.out.push(self.current.drain(..).collect());
        self.split_points.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[TextSegment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    const LYRICS: &str = "We were good, we were gold, Kind of dream that can't be sold, \
        We were right 'til we weren't, Built a home and watched it burn";

    #[test]
    fn explicit_separator_splits_strictly() {
        let s = Segmenter::default().split("Hello|World").unwrap();
        assert_eq!(texts(&s), vec!["Hello", "World"]);
        assert_eq!(s[0].index, 0);
        assert_eq!(s[1].index, 1);
    }

    #[test]
    fn explicit_parts_are_trimmed_and_empties_dropped() {
        let s = Segmenter::default().split(" Hello there | |General Kenobi|").unwrap();
        assert_eq!(texts(&s), vec!["Hello there", "General Kenobi"]);
    }

    #[test]
    fn explicit_policy_does_no_further_splitting() {
        let long = "word. ".repeat(100);
        let input = format!("{}|tail", long);
        let s = Segmenter::default().split(&input).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].text, long.trim());
    }

    #[test]
    fn only_separators_is_empty_text() {
        assert!(matches!(Segmenter::default().split("| |"), Err(GenerationError::EmptyText)));
    }

    #[test]
    fn policy_follows_separator_presence() {
        let seg = Segmenter::default();
        assert_eq!(seg.policy_for("a|b"), Policy::Explicit);
        assert_eq!(seg.policy_for("a. b."), Policy::Automatic);
    }

    #[test]
    fn short_text_is_one_segment() {
        let s = Segmenter::default().split(LYRICS).unwrap();
        assert_eq!(texts(&s), vec![LYRICS]);
    }

    #[test]
    fn short_sentences_are_recombined() {
        let s = Segmenter::default().split("One. Two! Three? Four.").unwrap();
        assert_eq!(texts(&s), vec!["One. Two! Three? Four."]);
    }

    #[test]
    fn long_text_respects_max_length_and_reconstructs() {
        let sentence = "The quick brown fox jumps over the lazy dog near the river bank. ";
        let input = sentence.repeat(20);
        let s = Segmenter::default().split(&input).unwrap();

        assert!(s.len() > 1);
        for seg in &s {
            assert!(!seg.text.trim().is_empty());
            assert!(seg.text.chars().count() <= 300, "too long: {}", seg.text.len());
        }
        let joined: String = s.iter().map(|seg| seg.text.as_str()).collect();
        assert_eq!(squash(&joined), squash(&input));
    }

    #[test]
    fn segments_end_on_sentence_boundaries_when_possible() {
        let sentence = "This sentence is exactly long enough to matter for the test here. ";
        let input = sentence.repeat(10);
        for seg in split_and_recombine(&input, 200, 300) {
            assert!(seg.ends_with('.'), "segment did not end on a sentence: {seg:?}");
        }
    }

    #[test]
    fn run_on_text_is_split_at_word_edges() {
        let input = "word ".repeat(200);
        let s = split_and_recombine(&input, 200, 300);
        assert!(s.len() > 1);
        for seg in &s {
            assert!(seg.chars().count() <= 300);
            assert!(seg.split(' ').all(|w| w == "word"), "split mid-word: {seg:?}");
        }
    }

    #[test]
    fn quoted_sentences_stay_together() {
        let input = "He said \"Stop. Wait. Go.\" and left.";
        let s = split_and_recombine(input, 5, 300);
        assert!(s.iter().any(|seg| seg.contains("\"Stop. Wait. Go.\"")), "got {s:?}");
    }

    #[test]
    fn whitespace_and_curly_quotes_are_normalized() {
        assert_eq!(normalize("a\n\n b\t\u{201C}c\u{201D}"), "a b \"c\"");
    }

    #[test]
    fn punctuation_only_pieces_are_dropped() {
        assert!(split_and_recombine("... !!! ??", 200, 300).is_empty());
        assert!(matches!(Segmenter::default().split("..."), Err(GenerationError::EmptyText)));
    }

    #[test]
    fn splitting_is_deterministic() {
        let input = "Alpha beta gamma. ".repeat(40);
        let seg = Segmenter::default();
        assert_eq!(seg.split(&input).unwrap(), seg.split(&input).unwrap());
    }

    #[test]
    fn zero_lengths_still_make_progress() {
        let seg = Segmenter::new(SegmenterConfig {
            desired_length: 0,
            max_length: 5,
            ..Default::default()
        });
        let s = seg.split("abcdefghij").unwrap();
        assert!(s.iter().all(|seg| !seg.text.is_empty()));
        assert!(s.iter().all(|seg| seg.text.chars().count() <= 5), "got {s:?}");
        assert_eq!(squash(&texts(&s).concat()), "abcdefghij");

        let s = split_and_recombine("one two", 0, 0);
        assert_eq!(squash(&s.concat()), "onetwo");
    }

    #[test]
    fn custom_separator_is_honored() {
        let seg = Segmenter::new(SegmenterConfig { separator: '#', ..Default::default() });
        let s = seg.split("a|b#c").unwrap();
        assert_eq!(texts(&s), vec!["a|b", "c"]);
    }
}
