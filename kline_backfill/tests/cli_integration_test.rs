#![cfg(feature = "cli")]
use std::{path::Path, process::Command, str};

use kline_backfill::{
    io::{CursorStore, FileCursorStore},
    models::{cursor::BackfillCursor, window::TimeWindow},
};
use serial_test::serial;

fn kline_backfill() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kline-backfill"));
    cmd.env("RUST_LOG", "off");
    for var in ["KLINE_SOURCE_URL", "KLINE_SINK_URL", "KLINE_SINK_INDEX", "KLINE_CONCURRENCY"] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("kline_backfill.toml");
    let content = format!("[cursor]\ndir = {:?}\n", dir.join("cursors"));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn resolve_prints_epoch_millis() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill()
        .args(["resolve", "--interval", "30m", "--start", "January 01, 2018", "--end", "January 02, 2018"])
        .output()?;
    assert!(output.status.success(), "stderr: {}", str::from_utf8(&output.stderr)?);

    let out: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(out["interval"], "30m");
    assert_eq!(out["step_ms"], 1_800_000);
    assert_eq!(out["start_ms"], 1_514_764_800_000i64);
    assert_eq!(out["end_ms"], 1_514_851_200_000i64);
    Ok(())
}

#[test]
#[serial]
fn resolve_without_end_is_open_ended() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill()
        .args(["resolve", "--interval", "1w", "--start", "2 weeks ago"])
        .output()?;
    assert!(output.status.success());

    let out: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(out["step_ms"], 604_800_000);
    assert!(out["end_ms"].is_null());
    Ok(())
}

#[test]
#[serial]
fn bad_interval_fails_before_any_request() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill()
        .args(["run", "--symbol", "ETHBTC", "--interval", "5x", "--dry-run"])
        // nothing may be listening here
        .env("KLINE_SOURCE_URL", "http://127.0.0.1:9")
        .output()?;
    assert!(!output.status.success());
    let stderr = str::from_utf8(&output.stderr)?;
    assert!(stderr.contains("5x"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
#[serial]
fn run_needs_symbols() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill().args(["run", "--dry-run"]).output()?;
    assert!(!output.status.success());
    assert!(str::from_utf8(&output.stderr)?.contains("--symbol"));
    Ok(())
}

#[test]
#[serial]
fn end_and_open_ended_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill()
        .args(["run", "--symbol", "ETHBTC", "--end", "now", "--open-ended"])
        .output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
#[serial]
fn cursor_show_and_clear() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path());
    let store = FileCursorStore::new(dir.path().join("cursors"));
    let mut saved = BackfillCursor::new("ETHBTC", "1h".parse()?, TimeWindow::new(0, Some(86_400_000)));
    saved.start_ms = 7_200_000;
    store.save(&saved)?;

    let output = kline_backfill()
        .arg("--config")
        .arg(&config)
        .args(["cursor", "show", "ETHBTC"])
        .output()?;
    assert!(output.status.success(), "stderr: {}", str::from_utf8(&output.stderr)?);
    let shown: BackfillCursor = serde_json::from_slice(&output.stdout)?;
    assert_eq!(shown, saved);

    let output = kline_backfill()
        .arg("--config")
        .arg(&config)
        .args(["cursor", "clear", "ETHBTC"])
        .output()?;
    assert!(output.status.success());
    assert_eq!(store.load("ETHBTC")?, None);

    let output = kline_backfill()
        .arg("--config")
        .arg(&config)
        .args(["cursor", "show", "ETHBTC"])
        .output()?;
    assert!(output.status.success());
    assert!(str::from_utf8(&output.stderr)?.contains("no cursor stored"));
    Ok(())
}

#[test]
#[serial]
fn cursor_commands_need_a_cursor_dir() -> Result<(), Box<dyn std::error::Error>> {
    let output = kline_backfill().args(["cursor", "show", "ETHBTC"]).output()?;
    assert!(!output.status.success());
    assert!(str::from_utf8(&output.stderr)?.contains("cursor.dir"));
    Ok(())
}
