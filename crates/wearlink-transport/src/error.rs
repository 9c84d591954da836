/// Errors a transport can report when handing a frame to the device link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link is not connected or has been shut down.
    #[error("transport closed")]
    Closed,

    /// An I/O error occurred while writing the frame.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
