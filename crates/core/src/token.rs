use serde::{Deserialize, Serialize};

/// Class id predicted for a single token by the token-classification model.
pub type LabelId = i64;

/// Label reported for a word that no token contributed to.
pub const NO_LABEL: LabelId = -1;

/// Structural tokens the tokenizer inserts around and between sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialToken {
    Start,
    Pad,
    Separator,
}

/// Where a token sits relative to word boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRole {
    /// First subword of a new word.
    WordStart,
    /// Subword glued onto the word currently being built.
    Continuation,
    Special(SpecialToken),
}

/// A tokenizer token with its role made explicit.
///
/// `text` never contains the tokenizer's word-start marker; for special
/// tokens it holds the raw sentinel string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub role: TokenRole,
    pub text: String,
}

impl TaggedToken {
    pub fn word_start(text: impl Into<String>) -> Self {
        Self { role: TokenRole::WordStart, text: text.into() }
    }

    pub fn continuation(text: impl Into<String>) -> Self {
        Self { role: TokenRole::Continuation, text: text.into() }
    }

    pub fn special(kind: SpecialToken, text: impl Into<String>) -> Self {
        Self { role: TokenRole::Special(kind), text: text.into() }
    }
}
