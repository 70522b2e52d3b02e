use serde::{Deserialize, Serialize};

use crate::token::{LabelId, NO_LABEL};

/// Text of the optional placeholder emitted in place of a separator token.
pub const SEPARATOR_PLACEHOLDER: &str = "[SEP]";

/// A whole word rebuilt from one or more subword tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "word")]
    pub text: String,
    /// One label per constituent token, in token order.
    pub labels: Vec<LabelId>,
    /// Label of the first constituent token, or [`NO_LABEL`].
    #[serde(rename = "label")]
    pub primary_label: LabelId,
}

impl Word {
    pub fn new(text: impl Into<String>, labels: Vec<LabelId>) -> Self {
        let primary_label = labels.first().copied().unwrap_or(NO_LABEL);
        Self { text: text.into(), labels, primary_label }
    }

    pub fn separator_placeholder(label: LabelId) -> Self {
        Self::new(SEPARATOR_PLACEHOLDER, vec![label])
    }

    pub fn is_placeholder(&self) -> bool {
        self.text == SEPARATOR_PLACEHOLDER
    }
}
