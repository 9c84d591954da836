use std::sync::Arc;

use wearlink_codec::RawFrame;

use crate::error::Result;

/// Outbound half of a device link.
///
/// Implementations own the on-air framing (length prefixes, checksums,
/// characteristic writes). `send_frame` should return once the frame has been
/// handed to the link; it must not wait for a device response.
pub trait Transport: Send + Sync {
    /// Hand one frame to the link.
    fn send_frame(&self, frame: &RawFrame) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send_frame(&self, frame: &RawFrame) -> Result<()> {
        (**self).send_frame(frame)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_frame(&self, frame: &RawFrame) -> Result<()> {
        (**self).send_frame(frame)
    }
}
