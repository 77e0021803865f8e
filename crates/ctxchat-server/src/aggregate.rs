//! Context aggregation — rendering a user's sources into the context blob.
//!
//! Adds are incremental (the new block is appended to the existing blob by
//! the orchestrator); removals recompute the blob here from scratch over
//! every remaining source, re-invoking the extractor per URL.

use ctxchat_core::context::{document_block, url_block, Document};
use ctxchat_extract::SourceExtractor;

/// Recompute the context blob for the given sources: one labeled block per
/// URL in insertion order, then one per document.
///
/// A URL that fails to extract contributes its labeled block with empty
/// text; the rebuild never fails as a whole. Callers apply the blob cap.
pub async fn rebuild_blob(
    extractor: &dyn SourceExtractor,
    urls: &[String],
    documents: &[Document],
) -> String {
    let mut blob = String::new();
    for url in urls {
        let text = match extractor.extract(url).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(url, error = %error, "extraction failed during rebuild");
                String::new()
            }
        };
        blob.push_str(&url_block(url, &text));
    }
    for doc in documents {
        blob.push_str(&document_block(&doc.name, &doc.text));
    }
    blob
}
