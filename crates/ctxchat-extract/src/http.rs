//! HTML page → plain text over HTTP.
//!
//! Fetches the page with a bounded timeout and keeps only paragraph text:
//! the first [`MAX_PARAGRAPHS`] `<p>` elements, each trimmed, joined with
//! newlines. Everything else on the page is ignored.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use crate::extractor::{ExtractError, SourceExtractor};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PARAGRAPHS: usize = 20;

pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceExtractor for HttpExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ExtractError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        let text = paragraph_text(&body);
        debug!(url = %url, chars = text.len(), "extracted page text");
        Ok(text)
    }
}

/// Paragraph text of an HTML document, one `<p>` per line.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("p") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };
    document
        .select(&selector)
        .take(MAX_PARAGRAPHS)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
