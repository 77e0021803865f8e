pub mod backend;
pub mod context;
pub mod errors;
pub mod ids;
pub mod stream;
pub mod text;

pub use backend::{ChatStream, LlmBackend};
pub use context::{Document, UserContext};
pub use errors::ContextError;
pub use ids::UserId;
pub use stream::ChatEvent;
