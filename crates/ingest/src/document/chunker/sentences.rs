//! Sentence segmentation.
//!
//! Latin-style text is split on terminal punctuation followed by whitespace and
//! on blank lines. Thai is written without sentence punctuation, so passages
//! containing Thai script go through a dictionary segmenter instead; without a
//! dictionary that text is refused rather than silently mis-split.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use semchunk_core::config::ChunkingConfig;
use tracing::info;

use super::types::Sentence;
use crate::error::ChunkingError;

const TERMINALS: &[char] = &['.', '!', '?', '…'];
/// CJK full-width terminals end a sentence without trailing whitespace.
const FULL_WIDTH_TERMINALS: &[char] = &['。', '！', '？'];
const CLOSERS: &[char] = &['"', '\'', ')', ']', '}', '”', '’', '»', '」', '』'];

/// Thai clauses shorter than this many words never end a sentence at a space.
const THAI_MIN_CLAUSE_WORDS: usize = 3;
/// Words that continue the previous clause when they open the next phrase.
const THAI_CONTINUATIONS: &[&str] = &[
    "และ", "หรือ", "แต่", "ที่", "ซึ่ง", "เพราะ", "โดย", "จึง", "ก็", "เพื่อ", "ว่า", "กับ",
];

fn is_thai(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}

fn contains_thai(text: &str) -> bool {
    text.chars().any(is_thai)
}

// ── Segmenter ───────────────────────────────────────────────────────────────

/// Splits passages into trimmed, non-empty sentences, in order.
#[derive(Debug, Clone, Default)]
pub struct SentenceSegmenter {
    thai: Option<Arc<ThaiDictionary>>,
}

impl SentenceSegmenter {
    /// Punctuation rules only; Thai input is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thai_dictionary(dictionary: ThaiDictionary) -> Self {
        Self {
            thai: Some(Arc::new(dictionary)),
        }
    }

    /// Build from config, loading the Thai word list when one is configured.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        match &config.thai_dictionary {
            None => Ok(Self::new()),
            Some(path) => {
                let dictionary = ThaiDictionary::from_path(path)?;
                info!(
                    path = %path.display(),
                    words = dictionary.len(),
                    "loaded Thai segmentation dictionary"
                );
                Ok(Self::with_thai_dictionary(dictionary))
            }
        }
    }

    /// Lazily iterate the sentences of `text`. The iterator is `Clone`, and
    /// calling this again restarts from the beginning.
    pub fn sentences<'a>(&'a self, text: &'a str) -> Result<Sentences<'a>, ChunkingError> {
        if !contains_thai(text) {
            return Ok(Sentences::Punctuation(PunctuationSentences { text, pos: 0 }));
        }
        match &self.thai {
            Some(dictionary) => Ok(Sentences::Thai(ThaiSentences {
                text,
                pos: 0,
                dictionary: dictionary.as_ref(),
            })),
            None => Err(ChunkingError::SegmenterUnavailable(
                "text contains Thai script but no Thai dictionary is configured (THAI_DICTIONARY)"
                    .into(),
            )),
        }
    }

    /// Collect sentences with their measured sizes.
    pub fn split(&self, text: &str) -> Result<Vec<Sentence>, ChunkingError> {
        Ok(self.sentences(text)?.map(Sentence::new).collect())
    }
}

/// Sentence iterator for one passage.
#[derive(Debug, Clone)]
pub enum Sentences<'a> {
    Punctuation(PunctuationSentences<'a>),
    Thai(ThaiSentences<'a>),
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        match self {
            Sentences::Punctuation(it) => it.next(),
            Sentences::Thai(it) => it.next(),
        }
    }
}

// ── Punctuation rules ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PunctuationSentences<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> PunctuationSentences<'a> {
    /// Byte offset just past the next sentence boundary at or after `pos`.
    fn next_boundary(&self) -> usize {
        let rest = &self.text[self.pos..];
        let mut chars = rest.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if FULL_WIDTH_TERMINALS.contains(&c) {
                return self.pos + i + c.len_utf8();
            }
            if TERMINALS.contains(&c) {
                let mut end = i + c.len_utf8();
                while let Some(&(j, next)) = chars.peek() {
                    if TERMINALS.contains(&next) || CLOSERS.contains(&next) {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                match chars.peek() {
                    None => return self.text.len(),
                    Some(&(_, next)) if next.is_whitespace() => return self.pos + end,
                    Some(_) => continue,
                }
            }
            if c == '\n' && starts_with_blank_line(&rest[i + 1..]) {
                return self.pos + i + 1;
            }
        }
        self.text.len()
    }
}

/// True when `s` begins with optional spaces/tabs followed by a newline.
fn starts_with_blank_line(s: &str) -> bool {
    s.trim_start_matches([' ', '\t', '\r']).starts_with('\n')
}

impl<'a> Iterator for PunctuationSentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while self.pos < self.text.len() {
            let end = self.next_boundary();
            let sentence = self.text[self.pos..end].trim();
            self.pos = end;
            if !sentence.is_empty() {
                return Some(sentence);
            }
        }
        None
    }
}

// ── Thai ────────────────────────────────────────────────────────────────────

/// Word list for longest-match Thai word segmentation.
#[derive(Debug, Clone, Default)]
pub struct ThaiDictionary {
    words: HashSet<String>,
    max_word_chars: usize,
}

impl ThaiDictionary {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words
            .into_iter()
            .map(|w| {
                let w: String = w.into();
                w.trim().to_string()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let max_word_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(0);
        Self {
            words,
            max_word_chars,
        }
    }

    /// Load one word per line; blank lines and `#` comments are skipped.
    /// A missing or empty word list is a configuration error.
    pub fn from_path(path: &Path) -> Result<Self, ChunkingError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChunkingError::SegmenterUnavailable(format!(
                "cannot read Thai dictionary {}: {e}",
                path.display()
            ))
        })?;
        let dictionary =
            Self::from_words(content.lines().filter(|line| !line.trim_start().starts_with('#')));
        if dictionary.is_empty() {
            return Err(ChunkingError::SegmenterUnavailable(format!(
                "Thai dictionary {} contains no words",
                path.display()
            )));
        }
        Ok(dictionary)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Longest-match word segmentation. Runs of characters not covered by the
    /// dictionary are kept together as one unknown token.
    pub fn tokenize<'a>(&self, phrase: &'a str) -> Vec<&'a str> {
        let bounds: Vec<usize> = phrase
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(phrase.len()))
            .collect();
        let n_chars = bounds.len() - 1;

        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut last_unknown = false;
        let mut i = 0;
        while i < n_chars {
            let longest = (1..=self.max_word_chars.min(n_chars - i))
                .rev()
                .find(|&k| self.words.contains(&phrase[bounds[i]..bounds[i + k]]));
            match longest {
                Some(k) => {
                    spans.push((bounds[i], bounds[i + k]));
                    last_unknown = false;
                    i += k;
                }
                None => {
                    match spans.last_mut() {
                        Some(span) if last_unknown => span.1 = bounds[i + 1],
                        _ => spans.push((bounds[i], bounds[i + 1])),
                    }
                    last_unknown = true;
                    i += 1;
                }
            }
        }
        spans.into_iter().map(|(s, e)| &phrase[s..e]).collect()
    }

    fn opens_with_continuation(&self, phrase: &str) -> bool {
        self.tokenize(phrase)
            .first()
            .is_some_and(|first| THAI_CONTINUATIONS.contains(first))
    }
}

#[derive(Debug, Clone)]
pub struct ThaiSentences<'a> {
    text: &'a str,
    pos: usize,
    dictionary: &'a ThaiDictionary,
}

impl<'a> ThaiSentences<'a> {
    /// Next whitespace-delimited phrase at or after `from`: (start, end).
    fn phrase_at(&self, from: usize) -> Option<(usize, usize)> {
        let rest = &self.text[from..];
        let start = from + rest.find(|c: char| !c.is_whitespace())?;
        let end = self.text[start..]
            .find(char::is_whitespace)
            .map_or(self.text.len(), |off| start + off);
        Some((start, end))
    }
}

impl<'a> Iterator for ThaiSentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (start, first_end) = self.phrase_at(self.pos)?;
        let (mut phrase_start, mut phrase_end) = (start, first_end);
        let mut clause_words = 0usize;

        loop {
            let phrase = &self.text[phrase_start..phrase_end];
            clause_words += self.dictionary.tokenize(phrase).len();

            let Some((next_start, next_end)) = self.phrase_at(phrase_end) else {
                self.pos = self.text.len();
                return Some(self.text[start..phrase_end].trim());
            };
            let gap = &self.text[phrase_end..next_start];
            let next_phrase = &self.text[next_start..next_end];

            let blank_line = gap.matches('\n').count() >= 2;
            let punctuated = phrase
                .trim_end_matches(CLOSERS)
                .ends_with(|c: char| TERMINALS.contains(&c) || FULL_WIDTH_TERMINALS.contains(&c));
            let thai_break = phrase.chars().last().is_some_and(is_thai)
                && next_phrase.chars().next().is_some_and(is_thai)
                && clause_words >= THAI_MIN_CLAUSE_WORDS
                && !self.dictionary.opens_with_continuation(next_phrase);

            if blank_line || punctuated || thai_break {
                self.pos = phrase_end;
                return Some(self.text[start..phrase_end].trim());
            }
            phrase_start = next_start;
            phrase_end = next_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        let segmenter = SentenceSegmenter::new();
        segmenter.sentences(text).unwrap().map(str::to_owned).collect()
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        assert_eq!(
            split("First sentence. Second one! Third? Fourth"),
            vec!["First sentence.", "Second one!", "Third?", "Fourth"]
        );
    }

    #[test]
    fn does_not_split_decimals_or_inner_dots() {
        assert_eq!(
            split("Pi is 3.14 roughly. Visit example.com today."),
            vec!["Pi is 3.14 roughly.", "Visit example.com today."]
        );
    }

    #[test]
    fn keeps_closing_quotes_with_sentence() {
        assert_eq!(
            split("He said \"stop.\" Then left."),
            vec!["He said \"stop.\"", "Then left."]
        );
    }

    #[test]
    fn splits_on_blank_lines() {
        assert_eq!(
            split("A heading without stop\n\nA paragraph\nwith a wrapped line"),
            vec!["A heading without stop", "A paragraph\nwith a wrapped line"]
        );
    }

    #[test]
    fn full_width_terminals_need_no_space() {
        assert_eq!(split("你好。再见！"), vec!["你好。", "再见！"]);
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(split("").is_empty());
        assert!(split("   \n\n\t ").is_empty());
    }

    #[test]
    fn iterator_is_restartable() {
        let segmenter = SentenceSegmenter::new();
        let text = "One. Two. Three.";
        let it = segmenter.sentences(text).unwrap();
        let first: Vec<&str> = it.clone().collect();
        let second: Vec<&str> = it.collect();
        let third: Vec<&str> = segmenter.sentences(text).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn thai_without_dictionary_is_fatal() {
        let segmenter = SentenceSegmenter::new();
        let err = segmenter.sentences("สวัสดีครับ").unwrap_err();
        assert!(matches!(err, ChunkingError::SegmenterUnavailable(_)));
    }

    fn thai_dictionary() -> ThaiDictionary {
        ThaiDictionary::from_words([
            "ฉัน", "ชอบ", "กิน", "ข้าว", "ผัด", "วันนี้", "ฝน", "ตก", "หนัก", "มาก", "และ", "ลม",
            "แรง",
        ])
    }

    #[test]
    fn thai_tokenize_longest_match() {
        let dict = thai_dictionary();
        assert_eq!(dict.tokenize("ฉันชอบกินข้าวผัด"), vec!["ฉัน", "ชอบ", "กิน", "ข้าว", "ผัด"]);
        // Unknown characters group into a single token.
        assert_eq!(dict.tokenize("ฉันxyz"), vec!["ฉัน", "xyz"]);
    }

    #[test]
    fn thai_splits_at_spaces_between_full_clauses() {
        let segmenter = SentenceSegmenter::with_thai_dictionary(thai_dictionary());
        let sentences: Vec<&str> = segmenter
            .sentences("ฉันชอบกินข้าวผัด วันนี้ฝนตกหนักมาก")
            .unwrap()
            .collect();
        assert_eq!(sentences, vec!["ฉันชอบกินข้าวผัด", "วันนี้ฝนตกหนักมาก"]);
    }

    #[test]
    fn thai_continuation_word_joins_clauses() {
        let segmenter = SentenceSegmenter::with_thai_dictionary(thai_dictionary());
        let sentences: Vec<&str> = segmenter
            .sentences("วันนี้ฝนตกหนักมาก และลมแรง")
            .unwrap()
            .collect();
        assert_eq!(sentences, vec!["วันนี้ฝนตกหนักมาก และลมแรง"]);
    }

    #[test]
    fn thai_short_clause_does_not_break() {
        let segmenter = SentenceSegmenter::with_thai_dictionary(thai_dictionary());
        let sentences: Vec<&str> = segmenter.sentences("ฝนตก ฉันชอบกินข้าว").unwrap().collect();
        assert_eq!(sentences, vec!["ฝนตก ฉันชอบกินข้าว"]);
    }

    #[test]
    fn dictionary_from_missing_path_is_unavailable() {
        let err = ThaiDictionary::from_path(Path::new("/nonexistent/thai-words.txt")).unwrap_err();
        assert!(matches!(err, ChunkingError::SegmenterUnavailable(_)));
    }

    #[test]
    fn dictionary_from_file_skips_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("words.txt");
        std::fs::write(&path, "# Thai words\nฉัน\n\nชอบ\n").unwrap();
        let dict = ThaiDictionary::from_path(&path).unwrap();
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn split_measures_sentences() {
        let sentences = SentenceSegmenter::new().split("Hello big world. Bye.").unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].char_length, 16);
        assert_eq!(sentences[0].token_length, 3);
    }
}
