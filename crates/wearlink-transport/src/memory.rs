use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use wearlink_codec::RawFrame;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// In-process transport that records every outbound frame.
///
/// Useful for offline tooling and for driving a command channel without a
/// radio: inspect what was sent, then feed responses back by hand.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<RawFrame>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent so far, oldest first.
    pub fn frames(&self) -> Vec<RawFrame> {
        self.lock().clone()
    }

    /// Most recently sent frame.
    pub fn last_frame(&self) -> Option<RawFrame> {
        self.lock().last().cloned()
    }

    /// Drain the recorded frames.
    pub fn take_frames(&self) -> Vec<RawFrame> {
        std::mem::take(&mut *self.lock())
    }

    /// Reject all further sends with [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RawFrame>> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn send_frame(&self, frame: &RawFrame) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        tracing::trace!(frame = %frame, "memory transport send");
        self.lock().push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wearlink_codec::FrameKey;

    use super::*;

    fn frame(payload: u8) -> RawFrame {
        RawFrame::new(FrameKey::new(5, 0x0e, None), vec![payload])
    }

    #[test]
    fn records_frames_in_order() {
        let transport = MemoryTransport::new();
        transport.send_frame(&frame(1)).unwrap();
        transport.send_frame(&frame(2)).unwrap();

        assert_eq!(transport.frames().len(), 2);
        assert_eq!(transport.last_frame().unwrap().payload.as_ref(), &[2]);
        assert_eq!(transport.take_frames().len(), 2);
        assert!(transport.frames().is_empty());
    }

    #[test]
    fn closed_transport_rejects_sends() {
        let transport = MemoryTransport::new();
        transport.close();
        let err = transport.send_frame(&frame(1)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(transport.last_frame().is_none());
    }

    #[test]
    fn shared_transport_sends_through_arc() {
        let transport = Arc::new(MemoryTransport::new());
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        dyn_transport.send_frame(&frame(9)).unwrap();
        assert_eq!(transport.frames().len(), 1);
    }
}
