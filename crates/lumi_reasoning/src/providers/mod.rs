pub mod mock;
pub mod openai;
mod sse;

pub use mock::MockProvider;
pub use openai::OpenAiCompatClient;
