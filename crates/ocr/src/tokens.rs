use gastocr_core::{LabelId, SpecialToken, TaggedToken};
use serde::Deserialize;

/// How a tokenizer spells its sentinels and marks the start of a word.
///
/// Defaults follow the byte-level BPE vocabulary shared by RoBERTa and
/// LayoutLMv3.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenConvention {
    pub start: String,
    pub pad: String,
    pub separator: String,
    pub word_prefix: String,
}

impl Default for TokenConvention {
    fn default() -> Self {
        Self {
            start: "<s>".into(),
            pad: "<pad>".into(),
            separator: "</s>".into(),
            word_prefix: "Ġ".into(),
        }
    }
}

impl TokenConvention {
    pub fn special_kind(&self, raw: &str) -> Option<SpecialToken> {
        if raw == self.start {
            Some(SpecialToken::Start)
        } else if raw == self.pad {
            Some(SpecialToken::Pad)
        } else if raw == self.separator {
            Some(SpecialToken::Separator)
        } else {
            None
        }
    }

    pub fn is_special(&self, raw: &str) -> bool {
        self.special_kind(raw).is_some()
    }

    pub fn tag(&self, raw: &str) -> TaggedToken {
        if let Some(kind) = self.special_kind(raw) {
            return TaggedToken::special(kind, raw);
        }
        match raw.strip_prefix(self.word_prefix.as_str()) {
            Some(rest) if !self.word_prefix.is_empty() => TaggedToken::word_start(rest),
            _ => TaggedToken::continuation(raw),
        }
    }

    /// Pair every raw token with its label. Extra entries on either side are
    /// dropped; engines guarantee equal lengths.
    pub fn tag_all<'a>(
        &'a self,
        tokens: &'a [String],
        labels: &'a [LabelId],
    ) -> impl Iterator<Item = (TaggedToken, LabelId)> + 'a {
        tokens
            .iter()
            .zip(labels.iter().copied())
            .map(move |(raw, label)| (self.tag(raw), label))
    }
}
