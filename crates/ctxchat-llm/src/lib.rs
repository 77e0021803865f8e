pub mod ollama;

pub mod mock;

pub use mock::{MockBackend, MockReply};
pub use ollama::{OllamaBackend, OllamaConfig};
