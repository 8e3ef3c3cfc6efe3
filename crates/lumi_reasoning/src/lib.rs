pub mod api_types;
pub mod emotion;
pub mod engine;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod summarizer;
pub mod vision;

pub use engine::{CompanionEngine, EngineSettings};
pub use llm::{CompletionParams, LlmClient};
pub use summarizer::LlmSummarizer;
pub use vision::{CommandCapture, InputActivity, ScreenCapture, VisualAnalyzer, VisualOutcome};
