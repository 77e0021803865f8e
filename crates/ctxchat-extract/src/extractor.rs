use async_trait::async_trait;

/// Why a URL could not be turned into text. Policy lives with the caller:
/// an add aborts on any of these, a removal rebuild degrades to an empty
/// block and keeps going.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("status {0}")]
    Status(u16),
}

/// Converts a URL into plain text. Possibly slow; implementations must
/// bound their own network time. A page that fetches fine but contains no
/// paragraph text yields `Ok("")`, not an error.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractError>;
}
