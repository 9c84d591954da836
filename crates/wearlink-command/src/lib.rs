//! Keyed command/response channel for wearlink devices.
//!
//! Commands are identified by their `(module, register, event id)` key. Each
//! send registers a pending entry and emits one frame; the entry is resolved
//! exactly once, either by the first inbound frame with the same key or by its
//! deadline. Frames that match nothing are handed back to the caller for
//! route dispatch.

pub mod channel;
pub mod config;
pub mod error;

pub use channel::{CommandChannel, CommandKey, FrameDisposition, PendingResponse};
pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
