use std::path::Path;
use std::process::{Command, Output};

use anyhow::Context as _;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn write_config(dir: &Path, yaml: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("load.yaml");
    std::fs::write(&path, yaml).context("write run config")?;
    Ok(path)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_rampr");

    let out = Command::new(exe)
        .arg("run")
        .arg("./does-not-matter.yaml")
        .arg("--pacing")
        .arg("10x")
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 30)
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_rampr"))
        .arg("--help")
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 0)
}

#[test]
fn missing_config_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = Command::new(env!("CARGO_BIN_EXE_rampr"))
        .arg("run")
        .arg(dir.path().join("nope.yaml"))
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("failed to read run config"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn negative_stage_target_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let config = write_config(
        dir.path(),
        "scenario: noop\nstages:\n  - { duration: 1s, target: 2 }\n  - { duration: 1s, target: -1 }\n",
    )?;

    let out = Command::new(env!("CARGO_BIN_EXE_rampr"))
        .arg("run")
        .arg(&config)
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 30)?;
    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(
        stderr.contains("stage 1: target must not be negative"),
        "stderr:\n{stderr}"
    );
    Ok(())
}

#[test]
fn empty_stages_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let config = write_config(dir.path(), "scenario: noop\nstages: []\n")?;

    let out = Command::new(env!("CARGO_BIN_EXE_rampr"))
        .arg("run")
        .arg(&config)
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 30)
}

#[test]
fn unreachable_service_fails_checks_exit_10() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let config = write_config(
        dir.path(),
        "scenario: user-flow\nstages:\n  - { duration: 500ms, target: 1 }\nstartVUs: 1\n",
    )?;

    let out = Command::new(env!("CARGO_BIN_EXE_rampr"))
        .arg("run")
        .arg(&config)
        .arg("--base-url")
        .arg("http://127.0.0.1:1")
        .arg("--pacing")
        .arg("100ms")
        .arg("--tick")
        .arg("100ms")
        .arg("--output")
        .arg("json")
        .output()
        .context("run rampr binary")?;

    ensure_code(&out, 10)
}
