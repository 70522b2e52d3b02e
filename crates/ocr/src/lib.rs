pub mod clean;
pub mod config;
pub mod engine;
pub mod extract;
pub mod hash;
pub mod layout;
#[cfg(feature = "layoutlm")]
pub mod layoutlm;
pub mod pipeline;
pub mod preprocess;
pub mod slot;
pub mod tokens;
pub mod words;

pub use clean::clean_text;
pub use config::{EngineConfig, EngineKind, PipelineConfig};
pub use engine::{FixtureEngine, InferenceEngine, MockEngine, ModelError, TokenPredictions};
pub use extract::{Extractor, ExtractorConfig};
pub use hash::{image_digest, sha256_bytes, to_hex};
pub use layout::{parse_tsv_words, OcrWord, WordSource};
pub use pipeline::{PipelineError, ReceiptAnalysis, ReceiptPipeline};
pub use preprocess::{decode_rgb, PreprocessError};
pub use slot::{EngineLoader, EngineSlot};
pub use tokens::TokenConvention;
pub use words::{reconstruct_words, WordReconstructor};
