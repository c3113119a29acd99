use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod envinfo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write an announcement message to a file.
    Encode(EncodeArgs),
    /// Print the messages stored in a file.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AnnounceArg {
    Acquire,
    Request,
    Offer,
    Revoke,
    Instantiate,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Kind of announcement.
    #[arg(long, value_enum)]
    pub kind: AnnounceArg,
    /// Id of the announcing process.
    #[arg(long, default_value_t = std::process::id())]
    pub id: u32,
    /// Interface id (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = encode::parse_u32)]
    pub interface: Option<u32>,
    /// Implementation handle (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = encode::parse_handle)]
    pub handle: Option<usize>,
    /// Exchange the request is addressed to. Default: unset.
    #[arg(long)]
    pub exchange: Option<u32>,
    /// Class to instantiate.
    #[arg(long)]
    pub class: Option<String>,
    /// Class version as MAJOR.MINOR, or "any".
    #[arg(long, default_value = "any")]
    pub version: String,
    /// File to write.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
    /// Append instead of truncating.
    #[arg(long)]
    pub append: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding consecutive envelopes.
    pub file: PathBuf,
    /// Largest message accepted, in bytes.
    #[arg(long, default_value_t = comrpc_frame::DEFAULT_MAX_MESSAGE)]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {
    /// Exchange configuration file (JSON) to load and show.
    #[arg(long, env = "COMRPC_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}
