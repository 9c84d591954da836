use std::fmt;
use std::num::NonZeroU8;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::frame::FrameKey;

/// Native width of a decoded value in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Width {
    One,
    Two,
    Four,
    Eight,
}

impl Width {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
            Width::Eight => 8,
        }
    }
}

impl TryFrom<u8> for Width {
    type Error = CodecError;

    fn try_from(size: u8) -> Result<Self> {
        match size {
            1 => Ok(Width::One),
            2 => Ok(Width::Two),
            4 => Ok(Width::Four),
            8 => Ok(Width::Eight),
            other => Err(CodecError::InvalidWidth(other)),
        }
    }
}

impl From<Width> for u8 {
    fn from(width: Width) -> u8 {
        width.bytes() as u8
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Conversion between physical units and device counts.
///
/// The forward direction (physical -> counts) runs when encoding a value for
/// the firmware; decoding applies the inverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitTransform {
    /// Values are already in firmware-native units.
    #[default]
    Identity,
    /// `counts = physical * factor`.
    Scaled { factor: ScaleFactor },
}

/// Non-zero scale factor for [`UnitTransform::Scaled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ScaleFactor(u32);

impl ScaleFactor {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for ScaleFactor {
    type Error = &'static str;

    fn try_from(factor: u32) -> std::result::Result<Self, Self::Error> {
        if factor == 0 {
            Err("scale factor must be non-zero")
        } else {
            Ok(Self(factor))
        }
    }
}

impl From<ScaleFactor> for u32 {
    fn from(factor: ScaleFactor) -> u32 {
        factor.0
    }
}

impl UnitTransform {
    /// Scale transform with `counts = physical * factor`. Returns `None` for a zero factor.
    pub fn scaled(factor: u32) -> Option<Self> {
        ScaleFactor::try_from(factor)
            .ok()
            .map(|factor| UnitTransform::Scaled { factor })
    }

    /// Physical units to device counts.
    pub fn to_counts(self, physical: i128) -> i128 {
        match self {
            UnitTransform::Identity => physical,
            UnitTransform::Scaled { factor } => physical * i128::from(factor.get()),
        }
    }

    /// Device counts to physical units (truncating toward zero).
    pub fn to_physical(self, counts: i128) -> i128 {
        match self {
            UnitTransform::Identity => counts,
            UnitTransform::Scaled { factor } => counts / i128::from(factor.get()),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, UnitTransform::Identity)
    }
}

/// Location and binary shape of one logical device channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueDescriptor {
    module: u8,
    register: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<u8>,
    size: Width,
    signed: bool,
    #[serde(default)]
    sample_offset: u8,
    #[serde(default = "one_sample")]
    sample_count: NonZeroU8,
    #[serde(default, skip_serializing_if = "UnitTransform::is_identity")]
    transform: UnitTransform,
}

fn one_sample() -> NonZeroU8 {
    NonZeroU8::MIN
}

impl ValueDescriptor {
    /// Create a single-sample descriptor at offset 0.
    pub fn new(module: u8, register: u8, size: u8, signed: bool) -> Result<Self> {
        Ok(Self {
            module,
            register,
            event_id: None,
            size: Width::try_from(size)?,
            signed,
            sample_offset: 0,
            sample_count: one_sample(),
            transform: UnitTransform::Identity,
        })
    }

    /// Set the event id that qualifies this channel's frames.
    pub fn with_event_id(mut self, event_id: u8) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Locate the samples inside the payload.
    pub fn with_samples(mut self, offset: u8, count: u8) -> Result<Self> {
        self.sample_count = NonZeroU8::new(count).ok_or(CodecError::InvalidSampleCount)?;
        self.sample_offset = offset;
        Ok(self)
    }

    pub fn with_transform(mut self, transform: UnitTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn module(&self) -> u8 {
        self.module
    }

    pub fn register(&self) -> u8 {
        self.register
    }

    pub fn event_id(&self) -> Option<u8> {
        self.event_id
    }

    pub fn width(&self) -> Width {
        self.size
    }

    /// Native size of one sample in bytes.
    pub fn size(&self) -> usize {
        self.size.bytes()
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn sample_offset(&self) -> usize {
        usize::from(self.sample_offset)
    }

    pub fn sample_count(&self) -> usize {
        usize::from(self.sample_count.get())
    }

    pub fn transform(&self) -> UnitTransform {
        self.transform
    }

    /// Number of payload bytes covered by all samples.
    pub fn span(&self) -> usize {
        self.size() * self.sample_count()
    }

    /// Minimum payload length this descriptor can decode.
    pub fn required_len(&self) -> usize {
        self.sample_offset() + self.span()
    }

    /// Frame key this descriptor's values arrive under.
    pub fn key(&self) -> FrameKey {
        FrameKey::new(self.module, self.register, self.event_id)
    }
}

impl fmt::Display for ValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.key(),
            if self.signed { "i" } else { "u" },
            self.size.bytes() * 8
        )?;
        if self.sample_count() > 1 {
            write!(f, "x{}", self.sample_count())?;
        }
        if self.sample_offset > 0 {
            write!(f, "@{}", self.sample_offset)?;
        }
        Ok(())
    }
}
