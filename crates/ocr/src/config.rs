use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::engine::{FixtureEngine, InferenceEngine, ModelError};
use crate::extract::ExtractorConfig;
use crate::slot::EngineLoader;
use crate::tokens::TokenConvention;
use crate::words::WordReconstructor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// LayoutLMv3 on ONNX Runtime with Tesseract word boxes.
    #[default]
    Layoutlm,
    /// Predictions replayed from a JSON file.
    Fixture,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Layoutlm => write!(f, "layoutlm"),
            EngineKind::Fixture => write!(f, "fixture"),
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "layoutlm" => Ok(EngineKind::Layoutlm),
            "fixture" => Ok(EngineKind::Fixture),
            other => Err(format!("Unknown engine kind: '{other}'")),
        }
    }
}

/// Which inference engine to load and where its files live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Tesseract data directory; the system default when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub ocr_lang: String,
    pub max_sequence_length: usize,
    pub fixture_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            model_dir: PathBuf::from("models/layoutlmv3-base"),
            tessdata_dir: None,
            ocr_lang: "eng".into(),
            max_sequence_length: 512,
            fixture_path: None,
        }
    }
}

impl EngineConfig {
    /// A loader that builds the configured engine when first needed.
    pub fn loader(&self, convention: &TokenConvention) -> Arc<dyn EngineLoader> {
        let config = self.clone();
        let pad_token = convention.pad.clone();
        Arc::new(move || -> Result<Arc<dyn InferenceEngine>, ModelError> {
            match config.kind {
                EngineKind::Fixture => {
                    let path = config
                        .fixture_path
                        .as_deref()
                        .ok_or_else(|| ModelError::Load("engine.fixture_path is not set".into()))?;
                    Ok(Arc::new(FixtureEngine::load(path)?))
                }
                EngineKind::Layoutlm => load_layoutlm(&config, &pad_token),
            }
        })
    }
}

#[cfg(all(feature = "layoutlm", feature = "tesseract"))]
fn load_layoutlm(
    config: &EngineConfig,
    pad_token: &str,
) -> Result<Arc<dyn InferenceEngine>, ModelError> {
    use crate::layout::tesseract_backend::TesseractWordSource;
    use crate::layoutlm::LayoutLmEngine;

    let words = Arc::new(TesseractWordSource::new(config.tessdata_dir.clone(), &config.ocr_lang));
    let engine =
        LayoutLmEngine::load(&config.model_dir, words, config.max_sequence_length, pad_token)?;
    Ok(Arc::new(engine))
}

#[cfg(not(all(feature = "layoutlm", feature = "tesseract")))]
fn load_layoutlm(
    _config: &EngineConfig,
    _pad_token: &str,
) -> Result<Arc<dyn InferenceEngine>, ModelError> {
    Err(ModelError::NotAvailable(
        "LayoutLM engine not built, enable the `layoutlm` and `tesseract` features".into(),
    ))
}

/// Settings for turning predictions into words and fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tokens: TokenConvention,
    pub words: WordReconstructor,
    pub extractor: ExtractorConfig,
}
