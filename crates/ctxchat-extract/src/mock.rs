//! Scriptable extractor for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::extractor::{ExtractError, SourceExtractor};

/// Test extractor keyed by URL. Unscripted URLs fail with a network error so
/// a test never silently extracts nothing. Responses can be rescripted
/// between calls, which is how rebuild-sees-current-output cases are
/// exercised.
#[derive(Default)]
pub struct MockExtractor {
    responses: Mutex<HashMap<String, Result<String, ExtractError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `url` to extract successfully as `text`.
    pub fn set_text(&self, url: &str, text: &str) {
        self.responses
            .lock()
            .expect("mock poisoned")
            .insert(url.to_string(), Ok(text.to_string()));
    }

    /// Script `url` to fail extraction.
    pub fn set_error(&self, url: &str) {
        self.responses.lock().expect("mock poisoned").insert(
            url.to_string(),
            Err(ExtractError::Network("scripted failure".into())),
        );
    }

    /// URLs extracted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock poisoned").len()
    }
}

#[async_trait]
impl SourceExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push(url.to_string());
        match self.responses.lock().expect("mock poisoned").get(url) {
            Some(result) => result.clone(),
            None => Err(ExtractError::Network(format!("no mock response for {url}"))),
        }
    }
}
