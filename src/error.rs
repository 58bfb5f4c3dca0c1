use thiserror::Error;

/// Failures that end a workflow stream.
///
/// Malformed records and unknown event types never show up here; they are
/// absorbed by the dispatcher.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("workflow endpoint '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("workflow endpoint '{url}' returned HTTP {status} without a response body")]
    MissingBody { url: String, status: u16 },

    #[error("cannot reach workflow endpoint '{url}': {reason}")]
    Connect { url: String, reason: String },

    #[error("workflow stream from '{url}' was interrupted: {reason}")]
    Interrupted { url: String, reason: String },

    #[error("stream handler failed: {0}")]
    Callback(#[source] anyhow::Error),
}

impl StreamError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::MissingBody { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Callback(_))
    }
}
