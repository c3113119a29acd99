#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/comrpc-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn comrpc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_comrpc"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("COMRPC_CONFIG")
        .env_remove("COMRPC_TRACE_CATEGORIES")
        .output()
        .expect("comrpc should run")
}

#[test]
fn encoded_announcements_decode_in_order() {
    let dir = unique_temp_dir("roundtrip");
    let file = dir.join("announce.bin");
    let path = file.to_str().expect("temp path should be utf-8");

    let first = comrpc(&[
        "--format", "json", "encode", "--kind", "offer", "--id", "7", "--interface", "0x101",
        "--handle", "3", "-o", path,
    ]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));

    let second = comrpc(&[
        "--format",
        "json",
        "encode",
        "--kind",
        "instantiate",
        "--id",
        "7",
        "--class",
        "Calculator",
        "--interface",
        "0x101",
        "--version",
        "1.2",
        "-o",
        path,
        "--append",
    ]);
    assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));

    let third = comrpc(&[
        "--format", "json", "encode", "--kind", "acquire", "--id", "7", "-o", path, "--append",
    ]);
    assert!(third.status.success());

    let decoded = comrpc(&["--format", "json", "decode", path]);
    assert!(decoded.status.success(), "{}", String::from_utf8_lossy(&decoded.stderr));

    let stdout = String::from_utf8_lossy(&decoded.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["message"], "Init");
    assert_eq!(records[0]["fields"]["kind"], "offer");
    assert_eq!(records[0]["fields"]["id"], 7);
    assert_eq!(records[1]["fields"]["kind"], "instantiate");
    assert_eq!(records[1]["fields"]["class_name"], "Calculator");
    assert_eq!(records[2]["fields"]["kind"], "acquire");
    assert_eq!(records[2]["index"], 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_garbage_is_data_invalid() {
    let dir = unique_temp_dir("garbage");
    let file = dir.join("garbage.bin");
    std::fs::write(&file, b"not an envelope at all").expect("write should succeed");

    let output = comrpc(&["decode", file.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_missing_file_fails() {
    let output = comrpc(&["decode", "/nonexistent/comrpc/input.bin"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn instantiate_without_class_is_usage_error() {
    let dir = unique_temp_dir("noclass");
    let file = dir.join("out.bin");

    let output = comrpc(&[
        "encode",
        "--kind",
        "instantiate",
        "--interface",
        "1",
        "-o",
        file.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(64));
    assert!(!file.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_name() {
    let output = comrpc(&["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("comrpc "));
}

#[test]
fn envinfo_reports_parent_exchange() {
    let output = Command::new(env!("CARGO_BIN_EXE_comrpc"))
        .args(["--log-level", "error", "--format", "json", "envinfo"])
        .env("COM_PARENT_EXCHANGE_ID", "42")
        .env_remove("COMRPC_CONFIG")
        .output()
        .expect("comrpc should run");
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("envinfo should print json");
    assert_eq!(json["parent_exchange_id"], 42);
    assert_eq!(json["config"]["timeout_ms"], 5000);
    assert_eq!(json["environment"]["COM_PARENT_EXCHANGE_ID"], "42");
}

#[test]
fn envinfo_loads_config_file() {
    let dir = unique_temp_dir("config");
    let file = dir.join("exchange.json");
    std::fs::write(&file, r#"{"proxy_stub_path":"/opt/stubs","timeout_ms":250}"#)
        .expect("write should succeed");

    let output = comrpc(&[
        "--format",
        "json",
        "envinfo",
        "--config",
        file.to_str().expect("utf-8 path"),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("envinfo should print json");
    assert_eq!(json["config"]["proxy_stub_path"], "/opt/stubs");
    assert_eq!(json["config"]["timeout_ms"], 250);
    assert_eq!(json["config"]["chunk_size"], 512);

    let _ = std::fs::remove_dir_all(&dir);
}
