//! Binary value codec for wearlink devices.
//!
//! Every device channel is described by a [`ValueDescriptor`]: where its
//! values live (module, register, optional event id) and how they are laid
//! out (width, signedness, sample offset and count, unit transform).
//!
//! - [`decode`] turns a payload into a [`TypedValue`]
//! - [`TypedValue::view`] re-reads it under a narrower or wider representation
//! - [`encode_for_firmware`] converts a value back to device bytes
//! - [`RawFrame`] is the split `[module][register][event id?][payload]` shape

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod register;
pub mod value;

pub use codec::{decode, decode_samples, encode_for_firmware};
pub use descriptor::{ScaleFactor, UnitTransform, ValueDescriptor, Width};
pub use error::{CodecError, Result};
pub use frame::{FrameKey, RawFrame, HEADER_SIZE, HEADER_SIZE_WITH_EVENT};
pub use register::{base_register, is_read, read_register, READ_FLAG};
pub use value::{TypedValue, Value, ValueKind};
