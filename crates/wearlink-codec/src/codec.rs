use std::time::SystemTime;

use bytes::{Bytes, BytesMut};

use crate::descriptor::{ValueDescriptor, Width};
use crate::error::{CodecError, Result};
use crate::value::{TypedValue, Value};

/// Decode a payload against a descriptor.
///
/// Reads exactly [`ValueDescriptor::span`] bytes starting at the sample
/// offset. A single sample decodes to its little-endian integer with the
/// inverse unit transform applied; packed samples decode to `RawBytes`.
pub fn decode(
    descriptor: &ValueDescriptor,
    payload: &[u8],
    timestamp: SystemTime,
) -> Result<TypedValue> {
    let span = sample_span(descriptor, payload)?;
    if descriptor.sample_count() > 1 {
        let raw = Bytes::copy_from_slice(span);
        return Ok(TypedValue::from_parts(
            Value::RawBytes(raw.clone()),
            timestamp,
            raw,
        ));
    }
    Ok(decode_sample(descriptor, span, timestamp))
}

/// Decode every packed sample as its own scalar value.
pub fn decode_samples(
    descriptor: &ValueDescriptor,
    payload: &[u8],
    timestamp: SystemTime,
) -> Result<Vec<TypedValue>> {
    let span = sample_span(descriptor, payload)?;
    Ok(span
        .chunks_exact(descriptor.size())
        .map(|sample| decode_sample(descriptor, sample, timestamp))
        .collect())
}

/// Convert a value to the bytes the firmware expects for this channel.
///
/// Identity channels pass the value through at the descriptor width; scaled
/// channels apply the forward transform first. `RawBytes` are never converted.
pub fn encode_for_firmware(descriptor: &ValueDescriptor, value: &Value) -> Result<Bytes> {
    let Some(physical) = value.as_i128() else {
        return Ok(value.to_le_bytes());
    };

    let counts = descriptor.transform().to_counts(physical);
    let size = descriptor.size();
    let bits = (size * 8) as u32;
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << bits) - 1;
    if counts < min || counts > max {
        return Err(CodecError::ValueOutOfRange {
            value: counts,
            size: size as u8,
        });
    }

    let mut out = BytesMut::with_capacity(size);
    out.extend_from_slice(&counts.to_le_bytes()[..size]);
    Ok(out.freeze())
}

fn sample_span<'a>(descriptor: &ValueDescriptor, payload: &'a [u8]) -> Result<&'a [u8]> {
    let needed = descriptor.required_len();
    if payload.len() < needed {
        return Err(CodecError::MalformedFrame {
            needed,
            actual: payload.len(),
        });
    }
    Ok(&payload[descriptor.sample_offset()..needed])
}

fn decode_sample(descriptor: &ValueDescriptor, sample: &[u8], timestamp: SystemTime) -> TypedValue {
    let native = read_native(descriptor.width(), descriptor.is_signed(), sample);
    let transform = descriptor.transform();
    let value = if transform.is_identity() {
        native
    } else {
        let kind = native.kind();
        native
            .as_i128()
            .map(|counts| transform.to_physical(counts))
            .and_then(|physical| Value::from_i128_truncating(kind, physical))
            .unwrap_or(native)
    };
    TypedValue::from_parts(value, timestamp, Bytes::copy_from_slice(sample))
}

fn read_native(width: Width, signed: bool, b: &[u8]) -> Value {
    match (width, signed) {
        (Width::One, false) => Value::UInt8(b[0]),
        (Width::One, true) => Value::Int8(b[0] as i8),
        (Width::Two, false) => Value::UInt16(u16::from_le_bytes([b[0], b[1]])),
        (Width::Two, true) => Value::Int16(i16::from_le_bytes([b[0], b[1]])),
        (Width::Four, false) => Value::UInt32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        (Width::Four, true) => Value::Int32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        (Width::Eight, false) => Value::UInt64(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Width::Eight, true) => Value::Int64(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
    }
}
