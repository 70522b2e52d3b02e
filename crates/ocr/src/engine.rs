use std::path::{Path, PathBuf};

use gastocr_core::LabelId;
use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Inference engine not available: {0}")]
    NotAvailable(String),
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Invalid model input: {0}")]
    InvalidInput(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Engine returned {tokens} tokens but {labels} labels")]
    Misaligned { tokens: usize, labels: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw model output: one label per token, aligned by index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPredictions")]
pub struct TokenPredictions {
    tokens: Vec<String>,
    labels: Vec<LabelId>,
}

#[derive(Deserialize)]
struct RawPredictions {
    tokens: Vec<String>,
    labels: Vec<LabelId>,
}

impl TryFrom<RawPredictions> for TokenPredictions {
    type Error = ModelError;
    fn try_from(raw: RawPredictions) -> Result<Self, Self::Error> {
        TokenPredictions::new(raw.tokens, raw.labels)
    }
}

impl TokenPredictions {
    pub fn new(tokens: Vec<String>, labels: Vec<LabelId>) -> Result<Self, ModelError> {
        if tokens.len() != labels.len() {
            return Err(ModelError::Misaligned { tokens: tokens.len(), labels: labels.len() });
        }
        Ok(Self { tokens, labels })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn labels(&self) -> &[LabelId] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, LabelId)> {
        self.tokens.iter().map(String::as_str).zip(self.labels.iter().copied())
    }
}

/// A token-classification model that reads a receipt image.
///
/// Implementations are shared across requests and must tolerate concurrent
/// `infer` calls.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<TokenPredictions, ModelError>;

    /// Short identifier used in logs and the health endpoint.
    fn name(&self) -> &str;
}

// ── Mock engine (always available, used for tests) ────────────────────────────

/// Returns preset predictions regardless of the image.
pub struct MockEngine {
    predictions: TokenPredictions,
}

impl MockEngine {
    pub fn new(predictions: TokenPredictions) -> Self {
        Self { predictions }
    }

    /// Build from `(token, label)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, LabelId)>) -> Self {
        let (tokens, labels): (Vec<String>, Vec<LabelId>) =
            pairs.into_iter().map(|(t, l)| (t.to_string(), l)).unzip();
        Self { predictions: TokenPredictions { tokens, labels } }
    }
}

impl InferenceEngine for MockEngine {
    fn infer(&self, _image: &RgbImage) -> Result<TokenPredictions, ModelError> {
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ── Fixture engine (recorded predictions on disk) ─────────────────────────────

/// Replays predictions recorded as `{"tokens": [...], "labels": [...]}`.
/// Lets the service run end to end on machines without model weights.
pub struct FixtureEngine {
    path: PathBuf,
    predictions: TokenPredictions,
}

impl FixtureEngine {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let data = std::fs::read(path)?;
        let predictions: TokenPredictions = serde_json::from_slice(&data)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))?;
        tracing::info!(
            "Loaded fixture predictions from {} ({} tokens)",
            path.display(),
            predictions.len()
        );
        Ok(Self { path: path.to_path_buf(), predictions })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InferenceEngine for FixtureEngine {
    fn infer(&self, _image: &RgbImage) -> Result<TokenPredictions, ModelError> {
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}
