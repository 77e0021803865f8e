//! Ollama `/api/generate` backend.
//!
//! One endpoint, two modes. Blocking sends `"stream": false` and reads a
//! single JSON body. Streaming sends `"stream": true` and reads
//! newline-delimited JSON records, each carrying an incremental `response`
//! fragment, relayed through [`NdjsonStream`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Future, Stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ctxchat_core::backend::{ChatStream, LlmBackend};
use ctxchat_core::errors::ContextError;
use ctxchat_core::stream::ChatEvent;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// Local models can take minutes to finish a long reply.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            config,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }

    async fn post_generate(
        &self,
        prompt: &str,
        stream: bool,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ContextError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream,
        };
        let mut req = self.client.post(self.generate_url()).json(&body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await.map_err(|e| ContextError::BackendUnavailable {
            reason: e.to_string(),
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ContextError::BackendUnavailable {
                reason: format!("status {status}: {body}"),
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn generate(&self, prompt: &str) -> Result<String, ContextError> {
        let resp = self
            .post_generate(prompt, false, Some(RESPONSE_TIMEOUT))
            .await?;

        let chunk: GenerateChunk =
            resp.json().await.map_err(|e| ContextError::BackendUnavailable {
                reason: format!("invalid response body: {e}"),
            })?;
        if let Some(err) = chunk.error {
            return Err(ContextError::BackendUnavailable { reason: err });
        }
        Ok(chunk.response.trim().to_string())
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, ContextError> {
        let resp = self.post_generate(prompt, true, None).await?;
        Ok(Box::pin(NdjsonStream::new(resp.bytes_stream())))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One record from `/api/generate` — the whole body in blocking mode, one
/// NDJSON line in streaming mode.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one NDJSON line into relay events. Blank lines are keep-alive
/// padding and produce nothing; anything else that fails to parse ends the
/// stream as an error.
fn decode_line(line: &str) -> Vec<ChatEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let chunk: GenerateChunk = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => {
            return vec![ChatEvent::Error {
                error: ContextError::BackendUnavailable {
                    reason: format!("bad stream record: {e}"),
                },
            }];
        }
    };
    if let Some(err) = chunk.error {
        return vec![ChatEvent::Error {
            error: ContextError::BackendUnavailable { reason: err },
        }];
    }
    let mut events = Vec::new();
    if !chunk.response.is_empty() {
        events.push(ChatEvent::fragment(chunk.response));
    }
    if chunk.done {
        events.push(ChatEvent::Done);
    }
    events
}

/// Wraps the response byte stream and yields ChatEvents, one per decoded
/// fragment, in arrival order. Exactly one terminal event is emitted: the
/// `done` record, an in-band error, or a synthesized `Done` at EOF. After
/// that the stream yields `None` without reading further, so dropping or
/// draining it releases the connection and the backend stops generating.
/// Includes an idle timeout — if no bytes arrive in `idle_duration`, the
/// stream errors out.
struct NdjsonStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: Vec<ChatEvent>,
    finished: bool,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
}

impl NdjsonStream {
    fn new(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self::with_idle_timeout(byte_stream, STREAM_IDLE_TIMEOUT)
    }

    fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            pending: Vec::new(),
            finished: false,
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
        }
    }

    fn emit(&mut self) -> ChatEvent {
        let event = self.pending.remove(0);
        if event.is_terminal() {
            // Records decoded after a terminal one never surface.
            self.finished = true;
            self.pending.clear();
        }
        event
    }
}

impl Stream for NdjsonStream {
    type Item = ChatEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        // Return queued events first
        if !self.pending.is_empty() {
            let event = self.emit();
            return std::task::Poll::Ready(Some(event));
        }
        if self.finished {
            return std::task::Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(bytes))) => {
                    // Data received — reset idle timer
                    let new_deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(new_deadline);

                    let text = String::from_utf8_lossy(&bytes);
                    self.buffer.push_str(&text);

                    // Decode complete lines; a trailing partial line waits
                    // for more bytes.
                    while let Some(pos) = self.buffer.find('\n') {
                        let line = self.buffer[..pos].to_string();
                        self.buffer = self.buffer[pos + 1..].to_string();
                        let events = decode_line(&line);
                        self.pending.extend(events);
                    }

                    if !self.pending.is_empty() {
                        let event = self.emit();
                        return std::task::Poll::Ready(Some(event));
                    }
                }
                std::task::Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return std::task::Poll::Ready(Some(ChatEvent::Error {
                        error: ContextError::BackendUnavailable {
                            reason: e.to_string(),
                        },
                    }));
                }
                std::task::Poll::Ready(None) => {
                    // Stream ended — a final unterminated line still counts
                    if !self.buffer.is_empty() {
                        let remaining = std::mem::take(&mut self.buffer);
                        let events = decode_line(&remaining);
                        self.pending.extend(events);
                        if !self.pending.is_empty() {
                            let event = self.emit();
                            return std::task::Poll::Ready(Some(event));
                        }
                    }
                    self.finished = true;
                    return std::task::Poll::Ready(Some(ChatEvent::Done));
                }
                std::task::Poll::Pending => {
                    // No data available — check idle timeout
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        self.finished = true;
                        return std::task::Poll::Ready(Some(ChatEvent::Error {
                            error: ContextError::BackendUnavailable {
                                reason: format!(
                                    "idle timeout after {}s",
                                    self.idle_duration.as_secs()
                                ),
                            },
                        }));
                    }
                    return std::task::Poll::Pending;
                }
            }
        }
    }
}
