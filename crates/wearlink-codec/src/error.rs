/// Errors that can occur while decoding or encoding device values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is shorter than the descriptor requires.
    #[error("malformed frame ({actual} bytes, need {needed})")]
    MalformedFrame { needed: usize, actual: usize },

    /// The descriptor width is not one of 1, 2, 4 or 8 bytes.
    #[error("invalid value width {0} (expected 1, 2, 4 or 8)")]
    InvalidWidth(u8),

    /// The descriptor declares zero samples.
    #[error("sample count must be at least 1")]
    InvalidSampleCount,

    /// The value cannot be observed under the requested representation.
    #[error("cannot view {from} value as {to}")]
    IncompatibleView {
        from: crate::value::ValueKind,
        to: crate::value::ValueKind,
    },

    /// The frame ended before its header was complete.
    #[error("truncated frame header ({len} bytes, need {needed})")]
    Truncated { len: usize, needed: usize },

    /// The converted value does not fit the descriptor width.
    #[error("value {value} does not fit in {size} bytes")]
    ValueOutOfRange { value: i128, size: u8 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
