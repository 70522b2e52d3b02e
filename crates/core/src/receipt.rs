use serde::Serialize;

use crate::money::Money;

/// Fields pulled out of a receipt's recognized words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Date substring exactly as it appears in the text.
    #[serde(rename = "fecha")]
    pub date: Option<String>,
    pub total: Option<Money>,
    /// Word texts joined with single spaces.
    #[serde(rename = "texto_completo_limpio")]
    pub full_text: String,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self { date: None, total: None, full_text: String::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.total.is_none()
    }
}
