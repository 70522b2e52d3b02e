//! LayoutLMv3 token classification on ONNX Runtime.
//!
//! The model directory must contain `model.onnx` (a token-classification
//! export taking `input_ids`, `bbox`, `attention_mask` and `pixel_values`)
//! and the matching `tokenizer.json`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use gastocr_core::LabelId;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::engine::{InferenceEngine, ModelError, TokenPredictions};
use crate::layout::WordSource;
use crate::preprocess;

/// Side of the square image fed to the visual backbone.
const IMAGE_SIZE: u32 = 224;

pub struct LayoutLmEngine {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    words: Arc<dyn WordSource>,
}

impl LayoutLmEngine {
    /// Load the ONNX session and tokenizer.
    ///
    /// Sequences are truncated and padded to `max_sequence_length`, using
    /// `pad_token` when the tokenizer file carries no padding setup.
    pub fn load(
        model_dir: &Path,
        words: Arc<dyn WordSource>,
        max_sequence_length: usize,
        pad_token: &str,
    ) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(ModelError::Load(format!("{} not found", required.display())));
            }
        }

        debug!("Loading ONNX model from: {}", model_path.display());
        let session = Session::builder()
            .map_err(|e| ModelError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Load(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::Load(format!("load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ModelError::Load(format!("set truncation: {e}")))?;

        let mut padding = tokenizer.get_padding().cloned().unwrap_or_else(|| {
            let mut params = PaddingParams::default();
            if let Some(id) = tokenizer.token_to_id(pad_token) {
                params.pad_id = id;
                params.pad_token = pad_token.to_string();
            }
            params
        });
        padding.strategy = PaddingStrategy::Fixed(max_sequence_length);
        tokenizer.with_padding(Some(padding));

        info!(model = %model_path.display(), max_sequence_length, "loaded LayoutLM model");
        Ok(Self { session: Mutex::new(session), tokenizer, words })
    }
}

impl InferenceEngine for LayoutLmEngine {
    fn infer(&self, image: &RgbImage) -> Result<TokenPredictions, ModelError> {
        let words = self.words.words(image)?;
        debug!("OCR produced {} words", words.len());

        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        let encoding = self
            .tokenizer
            .encode(texts, true)
            .map_err(|e| ModelError::Inference(format!("tokenize: {e}")))?;

        let seq_len = encoding.get_ids().len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let attention_mask: Vec<i64> =
            encoding.get_attention_mask().iter().map(|&m| i64::from(m)).collect();

        // Every subword inherits the box of the word it came from; special
        // tokens get the empty box.
        let (width, height) = image.dimensions();
        let word_boxes: Vec<[i64; 4]> =
            words.iter().map(|w| w.normalized_box(width, height)).collect();
        let mut bbox = Vec::with_capacity(seq_len * 4);
        for word_id in encoding.get_word_ids() {
            let b = word_id
                .and_then(|i| word_boxes.get(i as usize))
                .copied()
                .unwrap_or([0; 4]);
            bbox.extend_from_slice(&b);
        }

        let pixels = preprocess::pixel_values(image, IMAGE_SIZE);

        let seq_shape = [1i64, seq_len as i64];
        let side = i64::from(IMAGE_SIZE);
        let ids_tensor = Tensor::from_array((seq_shape, input_ids.into_boxed_slice()))
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
        let mask_tensor = Tensor::from_array((seq_shape, attention_mask.into_boxed_slice()))
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
        let bbox_tensor = Tensor::from_array(([1i64, seq_len as i64, 4], bbox.into_boxed_slice()))
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
        let pixel_tensor = Tensor::from_array(([1i64, 3, side, side], pixels.into_boxed_slice()))
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;

        let labels = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| ModelError::Inference(format!("Failed to lock session: {e}")))?;
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "bbox" => bbox_tensor,
                    "attention_mask" => mask_tensor,
                    "pixel_values" => pixel_tensor,
                ])
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            // Logits: [1, seq_len, num_labels].
            let (shape, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let dims: &[i64] = shape;
            if dims.len() != 3 || dims[0] != 1 {
                return Err(ModelError::Inference(format!("unexpected logits shape: {dims:?}")));
            }
            argmax_rows(logits, dims[2] as usize)
        };

        TokenPredictions::new(encoding.get_tokens().to_vec(), labels)
    }

    fn name(&self) -> &str {
        "layoutlm"
    }
}

/// Index of the largest value in each row of a row-major matrix.
fn argmax_rows(values: &[f32], row_len: usize) -> Vec<LabelId> {
    if row_len == 0 {
        return Vec::new();
    }
    values
        .chunks(row_len)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0 as LabelId
        })
        .collect()
}
