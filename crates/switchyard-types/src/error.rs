//! Error types for switchyard.
//!
//! [`SwitchyardError`] covers the bus, configuration and I/O; [`ChannelError`]
//! is what channel implementations and factories return. Both are
//! non-exhaustive.

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SwitchyardError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A bus queue rejected a message (full or closed).
    #[error("bus error: {0}")]
    Bus(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Channel-specific error type.
///
/// Construction-time failures use [`Unavailable`](ChannelError::Unavailable)
/// and [`InvalidConfig`](ChannelError::InvalidConfig); the manager treats
/// both as "channel disabled". Everything else is a runtime failure that
/// the manager logs and survives.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// Failed to establish a connection to the platform.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The platform rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving a message failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The channel has no live connection.
    #[error("not connected")]
    NotConnected,

    /// The requested channel was not found.
    #[error("channel not found: {0}")]
    NotFound(String),

    /// The integration for this channel is not available in this build.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// The channel's configuration section is invalid.
    #[error("invalid channel config: {0}")]
    InvalidConfig(String),

    /// Catch-all for errors that do not fit other variants.
    #[error("{0}")]
    Other(String),
}

impl ChannelError {
    /// Whether this error means the channel could not be constructed
    /// (as opposed to a runtime failure of a live channel).
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::InvalidConfig(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SwitchyardError>;
