use std::time::SystemTime;

use serde::Serialize;
use wearlink_codec::{TypedValue, UnitTransform, ValueDescriptor, ValueKind};

use crate::cmd::DecodeArgs;
use crate::exit::{codec_error, CliError, CliResult, SUCCESS};
use crate::output::{hex, print_json, table, OutputFormat};

#[derive(Serialize)]
struct ViewOutput {
    kind: &'static str,
    value: String,
}

#[derive(Serialize)]
struct SampleOutput {
    index: usize,
    kind: &'static str,
    bytes: String,
    views: Vec<ViewOutput>,
}

#[derive(Serialize)]
struct DecodeOutput {
    descriptor: String,
    payload: String,
    samples: Vec<SampleOutput>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = descriptor_from_args(&args)?;
    let payload = parse_hex(&args.payload)?;
    let now = SystemTime::now();

    let values = if args.samples {
        wearlink_codec::decode_samples(&descriptor, &payload, now)
    } else {
        wearlink_codec::decode(&descriptor, &payload, now).map(|value| vec![value])
    }
    .map_err(|err| codec_error("decode failed", err))?;

    let kinds: Vec<ValueKind> = args.views.iter().copied().map(ValueKind::from).collect();
    let samples = values
        .iter()
        .enumerate()
        .map(|(index, value)| sample_output(index, value, &kinds))
        .collect::<CliResult<Vec<_>>>()?;

    let out = DecodeOutput {
        descriptor: descriptor.to_string(),
        payload: hex(&payload),
        samples,
    };
    print_decode(&out, format)?;
    Ok(SUCCESS)
}

fn descriptor_from_args(args: &DecodeArgs) -> CliResult<ValueDescriptor> {
    let mut descriptor = ValueDescriptor::new(args.module, args.register, args.size, args.signed)
        .and_then(|d| d.with_samples(args.offset, args.count))
        .map_err(|err| codec_error("invalid descriptor", err))?;
    if let Some(event_id) = args.event_id {
        descriptor = descriptor.with_event_id(event_id);
    }
    if let Some(factor) = args.scale {
        let transform = UnitTransform::scaled(factor)
            .ok_or_else(|| CliError::usage("scale factor must be non-zero"))?;
        descriptor = descriptor.with_transform(transform);
    }
    Ok(descriptor)
}

fn sample_output(
    index: usize,
    value: &TypedValue,
    kinds: &[ValueKind],
) -> CliResult<SampleOutput> {
    let views = if kinds.is_empty() {
        value.compatible_kinds()
    } else {
        kinds.to_vec()
    };

    let views = views
        .into_iter()
        .map(|kind| {
            value
                .view(kind)
                .map(|v| ViewOutput {
                    kind: kind.name(),
                    value: v.to_string(),
                })
                .map_err(|err| codec_error("view failed", err))
        })
        .collect::<CliResult<Vec<_>>>()?;

    Ok(SampleOutput {
        index,
        kind: value.kind().name(),
        bytes: hex(value.as_bytes()),
        views,
    })
}

fn print_decode(out: &DecodeOutput, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(out)?,
        OutputFormat::Table => {
            let mut t = table(vec!["SAMPLE", "NATIVE", "VIEW", "VALUE"]);
            for sample in &out.samples {
                for view in &sample.views {
                    t.add_row(vec![
                        sample.index.to_string(),
                        sample.kind.to_string(),
                        view.kind.to_string(),
                        view.value.clone(),
                    ]);
                }
            }
            println!("{} [{}]", out.descriptor, out.payload);
            println!("{t}");
        }
        OutputFormat::Pretty => {
            println!("{} [{}]", out.descriptor, out.payload);
            for sample in &out.samples {
                println!("  #{} {} [{}]", sample.index, sample.kind, sample.bytes);
                for view in &sample.views {
                    println!("    {:<5} {}", view.kind, view.value);
                }
            }
        }
    }
    Ok(())
}

/// Accepts contiguous hex digits, optionally separated by spaces, `:` or `-`.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b' ' | b':' | b'-' | b'\t'))
        .collect();
    let digits = digits.strip_prefix(b"0x").unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        return Err(CliError::usage(format!(
            "hex payload has an odd number of digits: {input}"
        )));
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::usage(format!("invalid hex payload: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_separators() {
        assert_eq!(parse_hex("0b07").unwrap(), vec![0x0b, 0x07]);
        assert_eq!(parse_hex("0b 07").unwrap(), vec![0x0b, 0x07]);
        assert_eq!(parse_hex("07:30:81:0b:c0").unwrap().len(), 5);
        assert_eq!(parse_hex("0x0B07").unwrap(), vec![0x0b, 0x07]);
        assert!(parse_hex("0b0").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn default_views_cover_widening_and_bool() {
        let descriptor = ValueDescriptor::new(0, 0, 2, false).unwrap();
        let value =
            wearlink_codec::decode(&descriptor, &[0x0b, 0x07], SystemTime::UNIX_EPOCH).unwrap();
        let out = sample_output(0, &value, &[]).unwrap();

        let find = |kind: &str| {
            out.views
                .iter()
                .find(|v| v.kind == kind)
                .map(|v| v.value.clone())
        };
        assert_eq!(out.kind, "u16");
        assert_eq!(find("u32").as_deref(), Some("1803"));
        assert_eq!(find("u8").as_deref(), Some("11"));
        assert_eq!(find("bool").as_deref(), Some("true"));
    }

    #[test]
    fn explicit_incompatible_view_is_data_error() {
        let descriptor = ValueDescriptor::new(0, 0, 1, false)
            .unwrap()
            .with_samples(0, 2)
            .unwrap();
        let value = wearlink_codec::decode(&descriptor, &[1, 2], SystemTime::UNIX_EPOCH).unwrap();
        let err = sample_output(0, &value, &[ValueKind::UInt16]).err().unwrap();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
