use std::sync::Arc;

use gastocr_core::{ExtractionResult, Word};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, Instrument};

use crate::config::PipelineConfig;
use crate::engine::{ModelError, TokenPredictions};
use crate::extract::Extractor;
use crate::hash;
use crate::preprocess::{self, PreprocessError};
use crate::slot::EngineSlot;
use crate::tokens::TokenConvention;
use crate::words::WordReconstructor;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] PreprocessError),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[source] ModelError),
    #[error("Inference failed: {0}")]
    Inference(#[source] ModelError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller sent something we cannot process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidImage(_) | PipelineError::Inference(ModelError::InvalidInput(_))
        )
    }
}

/// Everything learned from one receipt image.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptAnalysis {
    /// SHA-256 of the uploaded bytes.
    pub image_sha256: String,
    #[serde(rename = "cleaned_words_output")]
    pub words: Vec<Word>,
    #[serde(rename = "extracted_information")]
    pub extracted: ExtractionResult,
}

/// Orchestrates: decode → inference → word reconstruction → field extraction.
pub struct ReceiptPipeline {
    slot: Arc<EngineSlot>,
    convention: TokenConvention,
    reconstructor: WordReconstructor,
    extractor: Extractor,
}

impl ReceiptPipeline {
    pub fn new(slot: Arc<EngineSlot>, config: PipelineConfig) -> Self {
        Self {
            slot,
            convention: config.tokens,
            reconstructor: config.words,
            extractor: Extractor::new(config.extractor),
        }
    }

    pub fn slot(&self) -> &Arc<EngineSlot> {
        &self.slot
    }

    pub fn convention(&self) -> &TokenConvention {
        &self.convention
    }

    /// Run the model on raw image bytes.
    pub async fn predict_tokens(&self, data: &[u8]) -> Result<TokenPredictions, PipelineError> {
        let image = preprocess::decode_rgb(data)?;
        let engine = self.slot.get().await.map_err(PipelineError::ModelUnavailable)?;

        let span = tracing::debug_span!("inference", engine = engine.name());
        let predictions = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            engine.infer(&image)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("inference task failed: {e}")))?
        .map_err(PipelineError::Inference)?;

        debug!("Model returned {} tokens", predictions.len());
        Ok(predictions)
    }

    /// Process raw bytes from an upload.
    pub async fn process_bytes(&self, data: &[u8]) -> Result<ReceiptAnalysis, PipelineError> {
        let image_sha256 = hash::image_digest(data);
        let span = tracing::info_span!("receipt", sha256 = %image_sha256);

        async move {
            let predictions = self.predict_tokens(data).await?;
            let (words, extracted) = self.analyze(&predictions);
            info!(
                words = words.len(),
                date_found = extracted.date.is_some(),
                total_found = extracted.total.is_some(),
                "Receipt processed"
            );
            Ok(ReceiptAnalysis { image_sha256, words, extracted })
        }
        .instrument(span)
        .await
    }

    /// Rebuild words from predictions and extract fields from them.
    pub fn analyze(&self, predictions: &TokenPredictions) -> (Vec<Word>, ExtractionResult) {
        let tagged = self.convention.tag_all(predictions.tokens(), predictions.labels());
        let words = self.reconstructor.reconstruct(tagged);
        let extracted = self.extractor.extract(&words);
        (words, extracted)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
