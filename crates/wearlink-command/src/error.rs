use std::time::Duration;

use wearlink_codec::FrameKey;

/// Errors that can occur while issuing or awaiting a command.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A command with the same key is still waiting for its response.
    #[error("command {0} already pending")]
    DuplicateKey(FrameKey),

    /// No matching response arrived before the deadline.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The pending table is full.
    #[error("too many pending commands (max {0})")]
    TooManyPending(usize),

    /// The channel was shut down before the command resolved.
    #[error("command channel shut down")]
    Shutdown,

    /// The transport refused the outbound frame.
    #[error("transport error: {0}")]
    Transport(#[from] wearlink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
