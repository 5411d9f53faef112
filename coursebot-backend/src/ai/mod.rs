pub mod claude;
pub mod generator;
pub mod types;

pub use claude::ClaudeClient;
pub use generator::{ResponseGenerator, DEFAULT_MAX_TOOL_ROUNDS};
pub use types::{ChatMessage, ChatRequest, ContentBlock, MessageContent, ModelResponse, StopReason};

use async_trait::async_trait;

/// Boundary to the chat model. One call takes the system text, the ordered
/// conversation so far, and the tools offered for this call; the reply is a
/// parsed [`ModelResponse`]. Transport and API errors come back as
/// descriptive strings and are never retried here.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ModelResponse, String>;
}
