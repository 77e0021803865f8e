use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::ContextError;
use crate::stream::ChatEvent;

/// Boxed fragment stream returned by streaming generation. Lazy, forward-only,
/// non-restartable; dropping it must stop upstream consumption.
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Trait implemented by each text-generation backend (Ollama in production,
/// mocks in tests). One prompt in, one reply out; no session state.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    /// Blocking generation: the full reply text, trimmed.
    async fn generate(&self, prompt: &str) -> Result<String, ContextError>;

    /// Streaming generation. `Err` means the stream could not be opened;
    /// failures after that arrive in-band as [`ChatEvent::Error`].
    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, ContextError>;
}
