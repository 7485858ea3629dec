use thiserror::Error;

/// Failure of a backend call, classified by how the engine recovers.
///
/// Transport crates convert their own errors into this type so the engine
/// never depends on a concrete HTTP stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network or server failure. Loaded pages are kept and a retry is offered.
    #[error("transient backend failure: {message}")]
    Transient { message: String },

    /// The response could not be understood. Treated as an empty, final page.
    #[error("malformed backend response: {message}")]
    Malformed { message: String },
}

impl BackendError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient { .. })
    }
}
