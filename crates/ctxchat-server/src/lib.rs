//! HTTP surface and chat orchestration for ctxchat.

pub mod aggregate;
pub mod handlers;
pub mod orchestrator;
pub mod server;

pub use orchestrator::ChatOrchestrator;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
