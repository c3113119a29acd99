use std::fs::OpenOptions;
use std::io::Write;

use bytes::BytesMut;
use comrpc_core::{version, ANY_VERSION};
use comrpc_frame::{decode_envelope, encode_message, BLOCK_SIZE, DEFAULT_MAX_MESSAGE};
use comrpc_message::{Handle, Init, UNSET_EXCHANGE_ID};

use crate::cmd::{decode, AnnounceArg, EncodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_records, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let init = build_init(&args)?;

    let mut buf = BytesMut::new();
    encode_message(&init, BLOCK_SIZE, &mut buf).map_err(|err| frame_error("encode failed", err))?;

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(args.append)
        .truncate(!args.append)
        .open(&args.output)
        .map_err(|err| io_error(&format!("failed opening {}", args.output.display()), err))?;
    file.write_all(&buf)
        .map_err(|err| io_error(&format!("failed writing {}", args.output.display()), err))?;
    tracing::debug!(
        file = %args.output.display(),
        kind = ?args.kind,
        bytes = buf.len(),
        "wrote announcement"
    );

    let envelope = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
        .map_err(|err| frame_error("re-read failed", err))?
        .ok_or_else(|| CliError::new(INTERNAL, "encoded envelope is incomplete"))?;
    print_records(&[decode::describe(0, envelope)?], format);
    Ok(SUCCESS)
}

pub fn build_init(args: &EncodeArgs) -> CliResult<Init> {
    let mut init = Init::new();
    match args.kind {
        AnnounceArg::Acquire => init.set_acquire(args.id),
        AnnounceArg::Request => init.set_request(
            args.id,
            required_interface(args)?,
            args.handle.map(Handle::new).unwrap_or(Handle::NULL),
            args.exchange.unwrap_or(UNSET_EXCHANGE_ID),
        ),
        AnnounceArg::Offer => {
            init.set_offer(args.id, required_interface(args)?, required_handle(args)?)
        }
        AnnounceArg::Revoke => {
            init.set_revoke(args.id, required_interface(args)?, required_handle(args)?)
        }
        AnnounceArg::Instantiate => {
            let class = args
                .class
                .as_deref()
                .filter(|class| !class.is_empty())
                .ok_or_else(|| CliError::usage("--kind instantiate needs a non-empty --class"))?;
            init.set_instantiate(
                args.id,
                class,
                required_interface(args)?,
                parse_version(&args.version)?,
            );
        }
    }
    Ok(init)
}

fn required_interface(args: &EncodeArgs) -> CliResult<u32> {
    args.interface
        .ok_or_else(|| CliError::usage(format!("--kind {:?} needs --interface", args.kind)))
}

fn required_handle(args: &EncodeArgs) -> CliResult<Handle> {
    match args.handle {
        Some(raw) if raw != 0 => Ok(Handle::new(raw)),
        _ => Err(CliError::usage(format!(
            "--kind {:?} needs a non-null --handle",
            args.kind
        ))),
    }
}

/// `MAJOR.MINOR`, or `any`.
pub fn parse_version(text: &str) -> CliResult<u32> {
    if text.eq_ignore_ascii_case("any") {
        return Ok(ANY_VERSION);
    }
    let invalid = || CliError::usage(format!("invalid --version '{text}': expected MAJOR.MINOR"));
    let (major, minor) = text.split_once('.').ok_or_else(invalid)?;
    let major = major.parse::<u16>().map_err(|_| invalid())?;
    let minor = minor.parse::<u16>().map_err(|_| invalid())?;
    Ok(version(major, minor))
}

pub fn parse_u32(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|err| format!("'{text}' is not a number: {err}"))
}

pub fn parse_handle(text: &str) -> Result<usize, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => text.parse::<usize>(),
    };
    parsed.map_err(|err| format!("'{text}' is not a handle: {err}"))
}
