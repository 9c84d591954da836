use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use wearlink_codec::ValueKind;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a hex payload against a descriptor.
    Decode(DecodeArgs),
    /// Print the tables of a saved board snapshot.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Payload bytes in hex (e.g. `0b07`, `"0b 07"`, `0b:07`).
    pub payload: String,
    /// Owning module id (decimal or 0x-prefixed).
    #[arg(long, value_parser = parse_byte, default_value = "0")]
    pub module: u8,
    /// Register (decimal or 0x-prefixed).
    #[arg(long, value_parser = parse_byte, default_value = "0")]
    pub register: u8,
    /// Event id qualifying the channel.
    #[arg(long, value_parser = parse_byte)]
    pub event_id: Option<u8>,
    /// Native width in bytes (1, 2, 4 or 8).
    #[arg(long, default_value = "1")]
    pub size: u8,
    /// Treat the native value as signed.
    #[arg(long)]
    pub signed: bool,
    /// Byte offset of the first sample.
    #[arg(long, default_value = "0")]
    pub offset: u8,
    /// Number of packed samples.
    #[arg(long, default_value = "1")]
    pub count: u8,
    /// Device counts per physical unit.
    #[arg(long)]
    pub scale: Option<u32>,
    /// Views to print (repeatable). Default: every compatible view.
    #[arg(long = "view", value_enum)]
    pub views: Vec<ViewArg>,
    /// Decode each packed sample separately.
    #[arg(long)]
    pub samples: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Bytes,
}

impl From<ViewArg> for ValueKind {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Bool => ValueKind::Bool,
            ViewArg::I8 => ValueKind::Int8,
            ViewArg::U8 => ValueKind::UInt8,
            ViewArg::I16 => ValueKind::Int16,
            ViewArg::U16 => ValueKind::UInt16,
            ViewArg::I32 => ValueKind::Int32,
            ViewArg::U32 => ValueKind::UInt32,
            ViewArg::I64 => ValueKind::Int64,
            ViewArg::U64 => ValueKind::UInt64,
            ViewArg::Bytes => ValueKind::RawBytes,
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot file to read.
    pub path: PathBuf,
    /// Skip JSON Schema validation.
    #[arg(long)]
    pub no_validate: bool,
    /// Maximum snapshot size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("expected a byte (0-255 or 0x00-0xff), got `{input}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_byte_accepts_decimal_and_hex() {
        assert_eq!(parse_byte("14"), Ok(14));
        assert_eq!(parse_byte("0x0e"), Ok(0x0e));
        assert_eq!(parse_byte("0XFF"), Ok(0xff));
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0x").is_err());
    }
}
