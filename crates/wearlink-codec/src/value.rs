use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Representation a decoded value can be observed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "i8")]
    Int8,
    #[serde(rename = "u8")]
    UInt8,
    #[serde(rename = "i16")]
    Int16,
    #[serde(rename = "u16")]
    UInt16,
    #[serde(rename = "i32")]
    Int32,
    #[serde(rename = "u32")]
    UInt32,
    #[serde(rename = "i64")]
    Int64,
    #[serde(rename = "u64")]
    UInt64,
    #[serde(rename = "bytes")]
    RawBytes,
}

impl ValueKind {
    /// Every kind, widest integer first.
    pub const ALL: [ValueKind; 10] = [
        ValueKind::UInt64,
        ValueKind::Int64,
        ValueKind::UInt32,
        ValueKind::Int32,
        ValueKind::UInt16,
        ValueKind::Int16,
        ValueKind::UInt8,
        ValueKind::Int8,
        ValueKind::Bool,
        ValueKind::RawBytes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int8 => "i8",
            ValueKind::UInt8 => "u8",
            ValueKind::Int16 => "i16",
            ValueKind::UInt16 => "u16",
            ValueKind::Int32 => "i32",
            ValueKind::UInt32 => "u32",
            ValueKind::Int64 => "i64",
            ValueKind::UInt64 => "u64",
            ValueKind::RawBytes => "bytes",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ValueKind::Bool | ValueKind::RawBytes)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tagged union over the value shapes a device channel produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[serde(rename = "bool")]
    Bool(bool),
    #[serde(rename = "i8")]
    Int8(i8),
    #[serde(rename = "u8")]
    UInt8(u8),
    #[serde(rename = "i16")]
    Int16(i16),
    #[serde(rename = "u16")]
    UInt16(u16),
    #[serde(rename = "i32")]
    Int32(i32),
    #[serde(rename = "u32")]
    UInt32(u32),
    #[serde(rename = "i64")]
    Int64(i64),
    #[serde(rename = "u64")]
    UInt64(u64),
    #[serde(rename = "bytes")]
    RawBytes(Bytes),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int8(_) => ValueKind::Int8,
            Value::UInt8(_) => ValueKind::UInt8,
            Value::Int16(_) => ValueKind::Int16,
            Value::UInt16(_) => ValueKind::UInt16,
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::RawBytes(_) => ValueKind::RawBytes,
        }
    }

    /// Integer value with the native signedness applied (sign- or zero-extended).
    ///
    /// `Bool` maps to 0/1; `RawBytes` has no integer reading.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Bool(b) => Some(i128::from(b)),
            Value::Int8(v) => Some(i128::from(v)),
            Value::UInt8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::UInt16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::UInt32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::UInt64(v) => Some(i128::from(v)),
            Value::RawBytes(_) => None,
        }
    }

    /// Build an integer value of `kind`, keeping only the low-order bits of `raw`.
    pub fn from_i128_truncating(kind: ValueKind, raw: i128) -> Option<Value> {
        Some(match kind {
            ValueKind::Bool => Value::Bool(raw != 0),
            ValueKind::Int8 => Value::Int8(raw as i8),
            ValueKind::UInt8 => Value::UInt8(raw as u8),
            ValueKind::Int16 => Value::Int16(raw as i16),
            ValueKind::UInt16 => Value::UInt16(raw as u16),
            ValueKind::Int32 => Value::Int32(raw as i32),
            ValueKind::UInt32 => Value::UInt32(raw as u32),
            ValueKind::Int64 => Value::Int64(raw as i64),
            ValueKind::UInt64 => Value::UInt64(raw as u64),
            ValueKind::RawBytes => return None,
        })
    }

    /// Little-endian bytes of the value at its native width.
    pub fn to_le_bytes(&self) -> Bytes {
        match self {
            Value::Bool(b) => Bytes::copy_from_slice(&[u8::from(*b)]),
            Value::Int8(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::UInt8(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::Int16(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::UInt16(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::Int32(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::Int64(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::UInt64(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Value::RawBytes(bytes) => bytes.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::RawBytes(bytes) => {
                f.write_str("[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A decoded value together with its arrival time and source bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    value: Value,
    timestamp: SystemTime,
    raw: Bytes,
}

impl TypedValue {
    /// Wrap a value; the source bytes are its little-endian encoding.
    pub fn new(value: Value, timestamp: SystemTime) -> Self {
        let raw = value.to_le_bytes();
        Self {
            value,
            timestamp,
            raw,
        }
    }

    pub(crate) fn from_parts(value: Value, timestamp: SystemTime, raw: Bytes) -> Self {
        Self {
            value,
            timestamp,
            raw,
        }
    }

    /// Native value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Payload bytes the value was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Observe the value under another representation.
    ///
    /// `Bool` checks only byte 0 of the source bytes. Narrower integers keep
    /// the low-order bytes; wider integers are sign- or zero-extended following
    /// the native value's signedness.
    pub fn view(&self, kind: ValueKind) -> Result<Value> {
        match kind {
            ValueKind::Bool => Ok(Value::Bool(self.raw.first().is_some_and(|b| *b != 0))),
            ValueKind::RawBytes => Ok(Value::RawBytes(self.raw.clone())),
            _ => self
                .value
                .as_i128()
                .and_then(|native| Value::from_i128_truncating(kind, native))
                .ok_or(CodecError::IncompatibleView {
                    from: self.kind(),
                    to: kind,
                }),
        }
    }

    /// Every representation [`TypedValue::view`] accepts for this value.
    pub fn compatible_kinds(&self) -> Vec<ValueKind> {
        ValueKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_integer() || self.value.as_i128().is_some())
            .collect()
    }

    pub fn as_bool(&self) -> bool {
        self.raw.first().is_some_and(|b| *b != 0)
    }

    pub fn as_i8(&self) -> Result<i8> {
        self.integer(ValueKind::Int8).map(|v| v as i8)
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.integer(ValueKind::UInt8).map(|v| v as u8)
    }

    pub fn as_i16(&self) -> Result<i16> {
        self.integer(ValueKind::Int16).map(|v| v as i16)
    }

    pub fn as_u16(&self) -> Result<u16> {
        self.integer(ValueKind::UInt16).map(|v| v as u16)
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.integer(ValueKind::Int32).map(|v| v as i32)
    }

    pub fn as_u32(&self) -> Result<u32> {
        self.integer(ValueKind::UInt32).map(|v| v as u32)
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.integer(ValueKind::Int64).map(|v| v as i64)
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.integer(ValueKind::UInt64).map(|v| v as u64)
    }

    fn integer(&self, to: ValueKind) -> Result<i128> {
        self.value.as_i128().ok_or(CodecError::IncompatibleView {
            from: self.kind(),
            to,
        })
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_epoch(value: Value) -> TypedValue {
        TypedValue::new(value, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn narrowing_keeps_low_order_bytes() {
        let value = at_epoch(Value::UInt32(0x1234_5678));
        assert_eq!(value.as_u16().unwrap(), 0x5678);
        assert_eq!(value.as_u8().unwrap(), 0x78);
        assert_eq!(value.view(ValueKind::Int8).unwrap(), Value::Int8(0x78));
    }

    #[test]
    fn widening_follows_native_signedness() {
        let signed = at_epoch(Value::Int16(-2));
        assert_eq!(signed.as_i64().unwrap(), -2);
        assert_eq!(signed.as_u32().unwrap(), 0xffff_fffe);

        let unsigned = at_epoch(Value::UInt16(0xfffe));
        assert_eq!(unsigned.as_u32().unwrap(), 0x0000_fffe);
        assert_eq!(unsigned.as_i64().unwrap(), 0xfffe);
    }

    #[test]
    fn bool_view_reads_only_first_byte() {
        assert!(at_epoch(Value::UInt16(0x0001)).as_bool());
        assert!(!at_epoch(Value::UInt16(0x0100)).as_bool());
        assert!(!at_epoch(Value::RawBytes(Bytes::new())).as_bool());
    }

    #[test]
    fn raw_bytes_reject_integer_views() {
        let value = at_epoch(Value::RawBytes(Bytes::from_static(&[1, 2, 3])));
        let err = value.as_u32().unwrap_err();
        assert!(matches!(
            err,
            CodecError::IncompatibleView {
                from: ValueKind::RawBytes,
                to: ValueKind::UInt32
            }
        ));
        assert_eq!(
            value.compatible_kinds(),
            vec![ValueKind::Bool, ValueKind::RawBytes]
        );
    }

    #[test]
    fn integer_values_support_every_view() {
        let value = at_epoch(Value::Int8(-1));
        assert_eq!(value.compatible_kinds().len(), ValueKind::ALL.len());
        for kind in ValueKind::ALL {
            assert!(value.view(kind).is_ok(), "view {kind} should succeed");
        }
    }

    #[test]
    fn value_serializes_with_short_tags() {
        let json = serde_json::to_string(&Value::UInt16(0x070b)).unwrap();
        assert_eq!(json, r#"{"type":"u16","value":1803}"#);
    }
}
