//! Chat orchestrator — wires the context store, source extractor, and LLM
//! backend together.
//!
//! Chat turns read a snapshot, call the backend, then commit the updated
//! history under the user's lease. The lease covers the commit only: holding
//! it across an LLM round-trip would serialize a user's chats end-to-end.
//! Source mutations (add/remove URL or document) hold the lease for the whole
//! read-modify-write cycle, extraction included, so concurrent mutations of
//! one user's sources cannot lose updates.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ctxchat_core::backend::{ChatStream, LlmBackend};
use ctxchat_core::context::{document_block, url_block, Document};
use ctxchat_core::errors::ContextError;
use ctxchat_core::ids::UserId;
use ctxchat_core::stream::ChatEvent;
use ctxchat_extract::SourceExtractor;
use ctxchat_store::ContextStore;

use crate::aggregate;

/// Backpressure bound between the relay pump and one streaming caller.
const STREAM_CHANNEL_CAPACITY: usize = 32;

pub struct ChatOrchestrator {
    store: ContextStore,
    extractor: Arc<dyn SourceExtractor>,
    backend: Arc<dyn LlmBackend>,
    max_urls: usize,
}

impl ChatOrchestrator {
    pub fn new(
        store: ContextStore,
        extractor: Arc<dyn SourceExtractor>,
        backend: Arc<dyn LlmBackend>,
        max_urls: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            backend,
            max_urls,
        }
    }

    /// One blocking chat turn: prompt from the current context, full reply
    /// from the backend, history committed before returning. A backend
    /// failure commits nothing.
    pub async fn converse(&self, user: &UserId, message: &str) -> Result<String, ContextError> {
        let prompt = self.store.get(user).prompt(message);
        let reply = self.backend.generate(&prompt).await.map_err(|error| {
            tracing::error!(user_id = %user, error = %error.error_kind(), "chat turn failed");
            error
        })?;
        let reply = reply.trim().to_string();

        let _lease = self.store.lease(user).await;
        let mut ctx = self.store.get(user);
        ctx.append_turn(message, &reply);
        self.store.put(user, ctx);
        tracing::info!(user_id = %user, reply_chars = reply.chars().count(), "chat turn committed");
        Ok(reply)
    }

    /// One streaming chat turn. Fragments are forwarded as they arrive; the
    /// accumulated reply is committed to history when the stream ends, however
    /// it ends — completion, mid-stream failure, or caller disconnect. If the
    /// backend stream never opens, nothing is committed and the caller gets a
    /// single in-band error fragment before end of stream.
    pub async fn converse_stream(&self, user: &UserId, message: &str) -> ReceiverStream<Bytes> {
        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
        let prompt = self.store.get(user).prompt(message);

        match self.backend.generate_stream(&prompt).await {
            Ok(stream) => {
                let store = self.store.clone();
                let user = user.clone();
                let message = message.to_string();
                tokio::spawn(pump_and_commit(stream, tx, store, user, message));
            }
            Err(error) => {
                tracing::error!(user_id = %user, error = %error.error_kind(), "stream open failed");
                // Capacity is at least 1, so this completes with no reader.
                let _ = tx.send(Bytes::from(format!("[Error: {error}]"))).await;
            }
        }

        ReceiverStream::new(rx)
    }

    /// Add a URL source: extract its text, append the rendered block to the
    /// blob. Rejected if the URL is already present, the URL cap is reached,
    /// or extraction yields nothing; a rejected add leaves state untouched.
    pub async fn add_url(&self, user: &UserId, url: &str) -> Result<(), ContextError> {
        let _lease = self.store.lease(user).await;
        let mut ctx = self.store.get(user);

        if ctx.has_url(url) {
            return Err(ContextError::duplicate_url());
        }
        if ctx.urls.len() >= self.max_urls {
            return Err(ContextError::TooManySources {
                limit: self.max_urls,
            });
        }

        let text = self.extractor.extract(url).await.map_err(|error| {
            tracing::warn!(user_id = %user, url, error = %error, "extraction failed");
            ContextError::ExtractionFailed
        })?;
        if text.is_empty() {
            return Err(ContextError::ExtractionFailed);
        }

        ctx.urls.push(url.to_string());
        ctx.append_context_block(&url_block(url, &text));
        self.store.put(user, ctx);
        tracing::info!(user_id = %user, url, "url added");
        Ok(())
    }

    /// Remove a URL source and rebuild the blob from everything remaining.
    pub async fn remove_url(&self, user: &UserId, url: &str) -> Result<(), ContextError> {
        let _lease = self.store.lease(user).await;
        let mut ctx = self.store.get(user);

        if !ctx.has_url(url) {
            return Err(ContextError::url_not_found());
        }
        ctx.urls.retain(|u| u != url);

        let blob = aggregate::rebuild_blob(self.extractor.as_ref(), &ctx.urls, &ctx.documents).await;
        ctx.replace_context_blob(blob);
        self.store.put(user, ctx);
        tracing::info!(user_id = %user, url, "url removed, context rebuilt");
        Ok(())
    }

    /// Add a document source. The name must be unique for the user.
    pub async fn add_document(
        &self,
        user: &UserId,
        name: &str,
        text: &str,
    ) -> Result<(), ContextError> {
        let _lease = self.store.lease(user).await;
        let mut ctx = self.store.get(user);

        if ctx.has_document(name) {
            return Err(ContextError::duplicate_document());
        }

        ctx.documents.push(Document {
            name: name.to_string(),
            text: text.to_string(),
        });
        ctx.append_context_block(&document_block(name, text));
        self.store.put(user, ctx);
        tracing::info!(user_id = %user, document = name, "document added");
        Ok(())
    }

    /// Remove a document source and rebuild the blob.
    pub async fn remove_document(&self, user: &UserId, name: &str) -> Result<(), ContextError> {
        let _lease = self.store.lease(user).await;
        let mut ctx = self.store.get(user);

        if !ctx.has_document(name) {
            return Err(ContextError::document_not_found());
        }
        ctx.documents.retain(|d| d.name != name);

        let blob = aggregate::rebuild_blob(self.extractor.as_ref(), &ctx.urls, &ctx.documents).await;
        ctx.replace_context_blob(blob);
        self.store.put(user, ctx);
        tracing::info!(user_id = %user, document = name, "document removed, context rebuilt");
        Ok(())
    }

    /// Current source listing: URLs and document names, insertion order.
    pub fn context_items(&self, user: &UserId) -> (Vec<String>, Vec<String>) {
        let ctx = self.store.get(user);
        let documents = ctx.document_names();
        (ctx.urls, documents)
    }

    /// Drop the user's context entirely.
    pub async fn reset(&self, user: &UserId) {
        let _lease = self.store.lease(user).await;
        self.store.reset(user);
        tracing::info!(user_id = %user, "context reset");
    }
}

/// Relay the backend stream to the caller and commit the accumulated reply
/// when it ends. A failed send means the caller went away; the backend stream
/// is dropped (cancelling generation upstream) and the commit still runs.
async fn pump_and_commit(
    mut stream: ChatStream,
    tx: mpsc::Sender<Bytes>,
    store: ContextStore,
    user: UserId,
    message: String,
) {
    let mut reply = String::new();

    while let Some(event) = stream.next().await {
        match event {
            ChatEvent::Fragment { text } => {
                reply.push_str(&text);
                if tx.send(Bytes::from(text)).await.is_err() {
                    tracing::debug!(user_id = %user, "caller disconnected mid-stream");
                    break;
                }
            }
            ChatEvent::Done => break,
            ChatEvent::Error { error } => {
                tracing::warn!(user_id = %user, error = %error.error_kind(), "stream failed mid-generation");
                let _ = tx.send(Bytes::from(format!("[Error: {error}]"))).await;
                break;
            }
        }
    }
    drop(stream);

    let reply = reply.trim().to_string();
    let _lease = store.lease(&user).await;
    let mut ctx = store.get(&user);
    ctx.append_turn(&message, &reply);
    store.put(&user, ctx);
    tracing::info!(user_id = %user, reply_chars = reply.chars().count(), "streamed turn committed");
}
