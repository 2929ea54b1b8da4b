mod anthropic;
mod budgeted;
mod http;
mod ollama;
mod openai;
mod registry;
mod retry;
mod traits;

pub use anthropic::{AnthropicBackend, AnthropicProvider};
pub use budgeted::BudgetedProvider;
pub use http::status_error;
pub use ollama::{OllamaBackend, OllamaProvider};
pub use openai::{OpenAIBackend, OpenAIProvider};
pub use registry::ProviderRegistry;
pub use retry::{RetryConfig, RetryHandler};
pub use traits::*;
