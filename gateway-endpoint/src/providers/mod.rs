//! Concrete [`crate::dialect::Dialect`] implementations, one per upstream
//! family (spec §1: OpenAI, Anthropic, Google, Mistral, xAI, plus local
//! inference servers).

pub mod anthropic;
pub mod gemini;
pub mod local;
pub mod openai;

pub use anthropic::AnthropicDialect;
pub use gemini::GeminiDialect;
pub use local::LocalDialect;
pub use openai::{MistralDialect, OpenAiDialect, XaiDialect};
