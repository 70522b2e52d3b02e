pub mod money;
pub mod receipt;
pub mod token;
pub mod word;

pub use money::Money;
pub use receipt::ExtractionResult;
pub use token::{LabelId, SpecialToken, TaggedToken, TokenRole, NO_LABEL};
pub use word::{Word, SEPARATOR_PLACEHOLDER};
