// Hosted model clients that implement `SummaryProvider`.

pub mod gemini_client;

pub use gemini_client::{GeminiClient, GenerationConfig};
