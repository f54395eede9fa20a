use thiserror::Error;

/// Errors produced by peer-to-peer calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request did not complete before the client timeout.
    #[error("request to {peer} timed out: {message}")]
    Timeout { peer: String, message: String },

    /// The peer could not be reached at the transport level.
    #[error("peer {peer} unavailable: {message}")]
    Unavailable { peer: String, message: String },

    /// The circuit for this peer is open; the call was not attempted.
    #[error("circuit open for peer {peer}")]
    CircuitOpen { peer: String },

    /// The peer answered with a non-success status.
    #[error("peer {peer} returned HTTP {status}: {body}")]
    Api {
        peer: String,
        status: u16,
        body: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {peer}: {message}")]
    Serialization { peer: String, message: String },

    /// The client was constructed with invalid settings.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl RpcError {
    #[must_use]
    pub fn timeout(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            peer: peer.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            peer: peer.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn api(peer: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            peer: peer.into(),
            status,
            body: body.into(),
        }
    }

    /// Classifies this error from a transport failure on the named peer.
    #[must_use]
    pub fn from_reqwest(peer: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(peer, err.to_string())
        } else if err.is_decode() {
            Self::Serialization {
                peer: peer.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::unavailable(peer, err.to_string())
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts, transport failures, and 5xx answers are retryable; 4xx
    /// answers and decode failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::CircuitOpen { .. } | Self::Serialization { .. } | Self::InvalidConfig(_) => false,
        }
    }
}
