#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn gattpipe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gattpipe"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("GATTPIPE_LOG")
        .env_remove("GATTPIPE_MTU")
        .env_remove("GATTPIPE_WRITE_OVERHEAD")
        .env_remove("GATTPIPE_TIMEOUT")
        .output()
        .expect("gattpipe should run")
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn chunk_reports_fragment_plan() {
    let output = gattpipe(&["--format", "json", "chunk", "--size", "50"]);
    let plan = json(&output);

    assert_eq!(plan["frame_size"], 54);
    assert_eq!(plan["fragment_size"], 20);
    let sizes: Vec<u64> = plan["fragments"]
        .as_array()
        .expect("fragments array")
        .iter()
        .map(|row| row["len"].as_u64().expect("len"))
        .collect();
    assert_eq!(sizes, vec![20, 20, 14]);
}

#[test]
fn chunk_raw_emits_wire_bytes() {
    let output = gattpipe(&["--format", "raw", "chunk", "--data", "hi"]);
    assert!(output.status.success());
    assert_eq!(output.stdout, vec![6, 0, 0, 0, b'h', b'i']);
}

#[test]
fn chunk_honors_mtu_from_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_gattpipe"))
        .args(["--log-level", "error", "--format", "json", "chunk", "--size", "100"])
        .env("GATTPIPE_MTU", "64")
        .env_remove("GATTPIPE_WRITE_OVERHEAD")
        .output()
        .expect("gattpipe should run");
    let plan = json(&output);

    assert_eq!(plan["reported_mtu"], 64);
    assert_eq!(plan["fragment_size"], 61);
    assert_eq!(plan["fragments"].as_array().map(Vec::len), Some(2));
}

#[test]
fn loopback_echoes_payload() {
    let output = gattpipe(&[
        "--format", "json", "loopback", "--data", "hello pipe", "--count", "2",
    ]);
    let report = json(&output);

    assert_eq!(report["frames_answered"], 2);
    assert_eq!(report["fragments_written"], 2);
    let exchanges = report["exchanges"].as_array().expect("exchanges array");
    assert_eq!(exchanges.len(), 2);
    assert!(exchanges
        .iter()
        .all(|exchange| exchange["response"] == "hello pipe"));
}

#[test]
fn loopback_raw_prints_transformed_response() {
    let output = gattpipe(&[
        "--format", "raw", "loopback", "--data", "abc", "--reply", "upper",
    ]);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"ABC");
}

#[test]
fn invalid_timeout_exits_with_usage() {
    let output = gattpipe(&["loopback", "--data", "x", "--timeout", "0s"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("duration"));
}

#[test]
fn version_prints_package_version() {
    let output = gattpipe(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("gattpipe {}", env!("CARGO_PKG_VERSION"))
    );
}
