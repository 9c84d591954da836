//! Transport boundary for wearlink.
//!
//! The radio stack, pairing and connection lifecycle live outside this
//! workspace. The command channel only needs somewhere to put outbound
//! frames, which is what [`Transport`] describes. Inbound frames travel the
//! other way by calling the channel directly.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::Transport;
