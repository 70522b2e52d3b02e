//! Word-level OCR with bounding boxes, the layout input of LayoutLM-style
//! models.

use image::RgbImage;

use crate::engine::ModelError;

/// A recognized word and its pixel bounding box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl OcrWord {
    /// Box scaled to the 0–1000 grid LayoutLM expects: `[x0, y0, x1, y1]`.
    pub fn normalized_box(&self, image_width: u32, image_height: u32) -> [i64; 4] {
        let scale = |v: u32, extent: u32| -> i64 {
            if extent == 0 {
                return 0;
            }
            ((u64::from(v) * 1000 / u64::from(extent)) as i64).clamp(0, 1000)
        };
        [
            scale(self.left, image_width),
            scale(self.top, image_height),
            scale(self.left.saturating_add(self.width), image_width),
            scale(self.top.saturating_add(self.height), image_height),
        ]
    }
}

/// Produces the words (and their boxes) visible in an image.
pub trait WordSource: Send + Sync {
    fn words(&self, image: &RgbImage) -> Result<Vec<OcrWord>, ModelError>;
}

/// Parse Tesseract TSV output, keeping word-level rows (level 5).
///
/// Columns: level page_num block_num par_num line_num word_num left top width
/// height conf text.
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 12 || fields[0] != "5" {
                return None;
            }
            let text = fields[11].trim();
            if text.is_empty() {
                return None;
            }
            Some(OcrWord {
                text: text.to_string(),
                left: fields[6].parse().ok()?,
                top: fields[7].parse().ok()?,
                width: fields[8].parse().ok()?,
                height: fields[9].parse().ok()?,
            })
        })
        .collect()
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use std::path::PathBuf;

    use image::RgbImage;
    use tesseract::Tesseract;

    use super::{parse_tsv_words, OcrWord, WordSource};
    use crate::engine::ModelError;
    use crate::preprocess;

    pub struct TesseractWordSource {
        data_path: Option<PathBuf>,
        lang: String,
    }

    impl TesseractWordSource {
        pub fn new(data_path: Option<PathBuf>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl WordSource for TesseractWordSource {
        fn words(&self, image: &RgbImage) -> Result<Vec<OcrWord>, ModelError> {
            let png = preprocess::encode_png(image)
                .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
            let data_path = match &self.data_path {
                Some(p) => Some(
                    p.to_str()
                        .ok_or_else(|| ModelError::Load("tessdata path is not UTF-8".into()))?,
                ),
                None => None,
            };

            // Tesseract handles are not Sync; build one per call.
            let tess = Tesseract::new(data_path, Some(&self.lang))
                .map_err(|e| ModelError::Load(format!("{e:?}")))?;
            let mut tess = tess
                .set_image_from_mem(&png)
                .map_err(|e| ModelError::InvalidInput(format!("{e:?}")))?;
            let tsv = tess
                .get_tsv_text(0)
                .map_err(|e| ModelError::Inference(format!("{e:?}")))?;
            Ok(parse_tsv_words(&tsv))
        }
    }
}
