use gastocr_core::{LabelId, SpecialToken, TaggedToken, TokenRole, Word};
use serde::Deserialize;

use crate::clean::clean_text;

/// Regroups subword tokens into whole words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WordReconstructor {
    /// Emit a `[SEP]` placeholder word for every separator token.
    pub keep_separators: bool,
}

/// Text and labels of the word currently being assembled.
#[derive(Default)]
struct Accumulator {
    text: String,
    labels: Vec<LabelId>,
}

impl Accumulator {
    /// Emit the pending word (if it survives cleaning) and reset.
    /// An accumulator without text is left untouched, labels included.
    fn flush_into(&mut self, words: &mut Vec<Word>) {
        if self.text.is_empty() {
            return;
        }
        let cleaned = clean_text(&self.text);
        let labels = std::mem::take(&mut self.labels);
        self.text.clear();
        if !cleaned.is_empty() {
            words.push(Word::new(cleaned, labels));
        }
    }
}

impl WordReconstructor {
    pub fn new(keep_separators: bool) -> Self {
        Self { keep_separators }
    }

    pub fn reconstruct<I>(&self, tokens: I) -> Vec<Word>
    where
        I: IntoIterator<Item = (TaggedToken, LabelId)>,
    {
        let mut words = Vec::new();
        let mut acc = Accumulator::default();

        for (token, label) in tokens {
            match token.role {
                TokenRole::Special(SpecialToken::Start | SpecialToken::Pad) => {
                    acc.flush_into(&mut words);
                }
                TokenRole::Special(SpecialToken::Separator) => {
                    acc.flush_into(&mut words);
                    if self.keep_separators {
                        words.push(Word::separator_placeholder(label));
                    }
                }
                TokenRole::WordStart => {
                    acc.flush_into(&mut words);
                    acc.text = token.text;
                    acc.labels = vec![label];
                }
                TokenRole::Continuation => {
                    acc.text.push_str(&token.text);
                    acc.labels.push(label);
                }
            }
        }
        acc.flush_into(&mut words);

        words
    }
}

/// Rebuild words with the default settings (separators dropped).
pub fn reconstruct_words<I>(tokens: I) -> Vec<Word>
where
    I: IntoIterator<Item = (TaggedToken, LabelId)>,
{
    WordReconstructor::default().reconstruct(tokens)
}
