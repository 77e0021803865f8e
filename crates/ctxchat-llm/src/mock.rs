use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use ctxchat_core::backend::{ChatStream, LlmBackend};
use ctxchat_core::errors::ContextError;
use ctxchat_core::stream::ChatEvent;

/// Pre-programmed replies for deterministic testing without a live backend.
pub enum MockReply {
    /// Full reply text; streams as one fragment then `Done`.
    Text(String),
    /// Streamed fragment sequence, then `Done`. Blocking calls see the
    /// concatenation.
    Fragments(Vec<String>),
    /// Exact event sequence, terminal included (for mid-stream failures).
    Events(Vec<ChatEvent>),
    /// Fail the call itself — the stream never opens.
    Error(ContextError),
    /// Wait a duration, then resolve to the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn fragments(parts: &[&str]) -> Self {
        Self::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }

    /// A stream that opens, yields `parts`, then fails in-band.
    pub fn fragments_then_error(parts: &[&str], reason: &str) -> Self {
        let mut events: Vec<ChatEvent> =
            parts.iter().map(|s| ChatEvent::fragment(*s)).collect();
        events.push(ChatEvent::Error {
            error: ContextError::BackendUnavailable {
                reason: reason.to_string(),
            },
        });
        Self::Events(events)
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::Error(ContextError::BackendUnavailable {
            reason: reason.to_string(),
        })
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock backend that consumes pre-programmed replies in order. One reply is
/// consumed per call, blocking or streaming alike. Prompts are recorded for
/// assertion.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("mock poisoned").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock poisoned").clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("mock poisoned").last().cloned()
    }

    fn next_reply(&self, prompt: &str) -> Result<MockReply, ContextError> {
        self.prompts
            .lock()
            .expect("mock poisoned")
            .push(prompt.to_string());
        self.replies
            .lock()
            .expect("mock poisoned")
            .pop_front()
            .ok_or_else(|| ContextError::BackendUnavailable {
                reason: "MockBackend: replies exhausted".into(),
            })
    }
}

/// Resolve a reply, unrolling nested delays iteratively.
async fn settle(mut reply: MockReply) -> Result<MockReply, ContextError> {
    loop {
        match reply {
            MockReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                reply = *inner;
            }
            MockReply::Error(e) => return Err(e),
            other => return Ok(other),
        }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ContextError> {
        match settle(self.next_reply(prompt)?).await? {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(parts) => Ok(parts.concat()),
            MockReply::Events(events) => {
                let mut text = String::new();
                for event in events {
                    match event {
                        ChatEvent::Fragment { text: t } => text.push_str(&t),
                        ChatEvent::Error { error } => return Err(error),
                        ChatEvent::Done => {}
                    }
                }
                Ok(text)
            }
            // settle() already resolved these
            MockReply::Error(_) | MockReply::Delay(..) => unreachable!(),
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, ContextError> {
        let events = match settle(self.next_reply(prompt)?).await? {
            MockReply::Text(text) => vec![ChatEvent::fragment(text), ChatEvent::Done],
            MockReply::Fragments(parts) => {
                let mut events: Vec<ChatEvent> =
                    parts.into_iter().map(ChatEvent::fragment).collect();
                events.push(ChatEvent::Done);
                events
            }
            MockReply::Events(events) => events,
            MockReply::Error(_) | MockReply::Delay(..) => unreachable!(),
        };
        Ok(Box::pin(stream::iter(events)))
    }
}
