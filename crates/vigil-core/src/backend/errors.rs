use thiserror::Error;

/// Errors returned by a single probe against a backend.
///
/// Every variant means "this probe failed this round". The poller absorbs them into the
/// backend's health; none of them is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProbeError {
    /// The probe did not complete within its timeout.
    #[error("Probe timeout")]
    Timeout,

    /// Connection could not be established or was dropped.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP status.
    ///
    /// First field is the HTTP status code, second is the (truncated) body.
    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {0}: {1}")]
    Rpc(i32, String),

    /// Response could not be decoded into the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProbeError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns a static label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Http(..) => "http",
            Self::Rpc(..) => "rpc",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}
