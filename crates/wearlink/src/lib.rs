//! Host-side engine for modular wearlink firmware devices.
//!
//! Turns raw device frames into typed values, matches commands to their
//! responses, and feeds streamed values through application routes.
//!
//! # Crate Structure
//!
//! - [`codec`]: value descriptors, typed values and the frame shape
//! - [`transport`]: the outbound frame boundary
//! - [`command`]: keyed command/response channel with timeouts
//! - [`route`]: route graphs dispatching values to subscribers
//! - [`state`]: versioned route graph snapshots (behind `state` feature)
//! - [`Board`]: one connection's command channel and routes wired together

pub mod board;

pub use board::{Board, Delivery};

/// Re-export codec types.
pub mod codec {
    pub use wearlink_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use wearlink_transport::*;
}

/// Re-export command channel types.
pub mod command {
    pub use wearlink_command::*;
}

/// Re-export route types.
pub mod route {
    pub use wearlink_route::*;
}

/// Re-export snapshot types (requires `state` feature).
#[cfg(feature = "state")]
pub mod state {
    pub use wearlink_state::*;
}
