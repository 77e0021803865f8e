use crate::errors::ContextError;

/// Events emitted while relaying a generation stream. Contract:
///
/// Fragment* → (Done | Error)
///
/// Fragments arrive in generation order and are never empty; a record with
/// an empty fragment is dropped by the relay rather than forwarded. Nothing
/// follows a terminal event.
#[derive(Clone, Debug)]
pub enum ChatEvent {
    /// Incremental reply text.
    Fragment { text: String },
    /// Generation finished cleanly.
    Done,
    /// The stream failed; whatever arrived before this is all there is.
    Error { error: ContextError },
}

impl ChatEvent {
    pub fn fragment(text: impl Into<String>) -> Self {
        Self::Fragment { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// The fragment text, if this is a fragment.
    pub fn as_fragment(&self) -> Option<&str> {
        match self {
            Self::Fragment { text } => Some(text),
            _ => None,
        }
    }
}
