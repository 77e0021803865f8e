/// Typed error hierarchy for context and chat operations.
/// Display strings are the wire-visible `detail` messages, so validation
/// variants keep the exact phrasing GUI clients match on.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ContextError {
    // Validation — caller mistake, request rejected
    #[error("{0} already added.")]
    DuplicateSource(String),
    #[error("{0} not found.")]
    SourceNotFound(String),
    #[error("Failed to fetch URL content")]
    ExtractionFailed,
    #[error("URL limit reached ({limit} max).")]
    TooManySources { limit: usize },

    // Upstream — the LLM call failed or returned non-success
    #[error("LLM error")]
    BackendUnavailable { reason: String },
}

impl ContextError {
    pub fn duplicate_url() -> Self {
        Self::DuplicateSource("URL".into())
    }

    pub fn duplicate_document() -> Self {
        Self::DuplicateSource("Document".into())
    }

    pub fn url_not_found() -> Self {
        Self::SourceNotFound("URL".into())
    }

    pub fn document_not_found() -> Self {
        Self::SourceNotFound("Document".into())
    }

    /// True for errors the caller can fix by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSource(_)
                | Self::SourceNotFound(_)
                | Self::ExtractionFailed
                | Self::TooManySources { .. }
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DuplicateSource(_) => "duplicate_source",
            Self::SourceNotFound(_) => "source_not_found",
            Self::ExtractionFailed => "extraction_failed",
            Self::TooManySources { .. } => "too_many_sources",
            Self::BackendUnavailable { .. } => "backend_unavailable",
        }
    }

    /// HTTP status the error maps to: 400 for validation, 500 upstream.
    pub fn http_status(&self) -> u16 {
        if self.is_validation() {
            400
        } else {
            500
        }
    }
}
