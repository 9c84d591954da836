use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Frame header without event id: module (1) + register (1).
pub const HEADER_SIZE: usize = 2;

/// Frame header with event id: module (1) + register (1) + event id (1).
pub const HEADER_SIZE_WITH_EVENT: usize = 3;

/// Identifies which channel a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameKey {
    pub module_id: u8,
    pub register: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u8>,
}

impl FrameKey {
    pub fn new(module_id: u8, register: u8, event_id: Option<u8>) -> Self {
        Self {
            module_id,
            register,
            event_id,
        }
    }

    /// Header length a frame with this key occupies on the wire.
    pub fn header_size(&self) -> usize {
        if self.event_id.is_some() {
            HEADER_SIZE_WITH_EVENT
        } else {
            HEADER_SIZE
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}", self.module_id, self.register)?;
        if let Some(event_id) = self.event_id {
            write!(f, ":{event_id:02x}")?;
        }
        Ok(())
    }
}

/// One binary protocol message exchanged with the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub module_id: u8,
    pub register: u8,
    pub event_id: Option<u8>,
    pub payload: Bytes,
}

impl RawFrame {
    /// Create a new frame.
    pub fn new(key: FrameKey, payload: impl Into<Bytes>) -> Self {
        Self {
            module_id: key.module_id,
            register: key.register,
            event_id: key.event_id,
            payload: payload.into(),
        }
    }

    pub fn key(&self) -> FrameKey {
        FrameKey::new(self.module_id, self.register, self.event_id)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        self.key().header_size() + self.payload.len()
    }

    /// Encode the frame into its wire shape.
    ///
    /// ```text
    /// ┌────────────┬──────────────┬────────────────────┬─────────────┐
    /// │ Module (1B)│ Register (1B)│ Event id (1B, opt.) │ Payload (N) │
    /// └────────────┴──────────────┴────────────────────┴─────────────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u8(self.module_id);
        dst.put_u8(self.register);
        if let Some(event_id) = self.event_id {
            dst.put_u8(event_id);
        }
        dst.put_slice(&self.payload);
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Split an already-delimited frame into its parts.
    ///
    /// Whether the third byte is an event id depends on the channel, so the
    /// caller says which shape to expect.
    pub fn decode(src: &[u8], has_event_id: bool) -> Result<Self> {
        let needed = if has_event_id {
            HEADER_SIZE_WITH_EVENT
        } else {
            HEADER_SIZE
        };
        if src.len() < needed {
            return Err(CodecError::Truncated {
                len: src.len(),
                needed,
            });
        }

        let event_id = has_event_id.then(|| src[2]);
        Ok(Self {
            module_id: src[0],
            register: src[1],
            event_id,
            payload: Bytes::copy_from_slice(&src[needed..]),
        })
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.key())?;
        for (i, b) in self.payload.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        f.write_str("]")
    }
}
