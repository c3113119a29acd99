use std::collections::BTreeMap;

use comrpc_exchange::ExchangeConfig;
use comrpc_message::{parent_exchange_id, PARENT_EXCHANGE_ID_VAR, UNSET_EXCHANGE_ID};
use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{exchange_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    version: String,
    target: String,
    rust_version: String,
    git_hash: String,
    platform: PlatformInfo,
    features: Vec<String>,
    parent_exchange_id: Option<u32>,
    config: ExchangeConfig,
    environment: BTreeMap<String, Option<String>>,
}

pub fn run(args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => ExchangeConfig::from_file(path).map_err(|err| {
            exchange_error(&format!("failed loading {}", path.display()), err)
        })?,
        None => ExchangeConfig::default(),
    };

    let mut env = BTreeMap::new();
    for name in [PARENT_EXCHANGE_ID_VAR, "COMRPC_CONFIG", "RUST_LOG"] {
        env.insert(name.to_string(), std::env::var(name).ok());
    }

    let parent = parent_exchange_id();
    let output = EnvInfoOutput {
        version: env!("CARGO_PKG_VERSION").to_string(),
        target: target_triple(),
        rust_version: option_env!("RUSTC_VERSION")
            .unwrap_or("unknown")
            .to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        platform: PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
        features: active_features(),
        parent_exchange_id: (parent != UNSET_EXCHANGE_ID).then_some(parent),
        config,
        environment: env,
    };

    print_envinfo(&output, format);
    Ok(SUCCESS)
}

fn target_triple() -> String {
    if let Some(target) = option_env!("COMRPC_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn print_envinfo(output: &EnvInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("comrpc environment\n");
            println!("  Version:    {}", output.version);
            println!("  Target:     {}", output.target);
            println!("  Rust:       {}", output.rust_version);
            println!("  Git hash:   {}", output.git_hash);
            println!(
                "  Platform:   {} ({})",
                output.platform.os, output.platform.arch
            );
            println!("  Features:   {}", output.features.join(", "));
            match output.parent_exchange_id {
                Some(id) => println!("  Exchange:   {id}"),
                None => println!("  Exchange:   (unset)"),
            }
            println!("\n  Config:");
            println!("    {:<18} {}", "proxy_stub_path", output.config.proxy_stub_path);
            println!("    {:<18} {}", "trace_categories", output.config.trace_categories);
            println!("    {:<18} {}", "max_message_size", output.config.max_message_size);
            println!("    {:<18} {}", "chunk_size", output.config.chunk_size);
            println!("    {:<18} {}", "timeout_ms", output.config.timeout_ms);
            println!("\n  Environment:");
            for (k, v) in &output.environment {
                println!("    {:<24} {}", k, v.as_deref().unwrap_or("(not set)"));
            }
        }
        OutputFormat::Raw => println!("{}", output.version),
    }
}

fn active_features() -> Vec<String> {
    let mut features = Vec::new();
    if cfg!(feature = "exchange") {
        features.push("exchange".to_string());
    }
    if cfg!(feature = "cli") {
        features.push("cli".to_string());
    }
    features
}
