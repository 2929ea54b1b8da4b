//! Built-in abilities, one per [`AbilityKind`](super::AbilityKind) tag.
//!
//! - `QueryLanguageModel` and `TextSummarize` delegate to a language model
//! - `ReadFile` and `WriteFile` operate inside the workspace

mod file;
mod llm;

pub use file::{ReadFile, WriteFile};
pub use llm::{QueryLanguageModel, TextSummarize};
