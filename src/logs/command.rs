// src/logs/command.rs

//! Running platform log commands (`kubectl logs`, `cf logs`).

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::debug;

/// Run `program args...` to completion and return its stdout.
///
/// A non-zero exit is an error carrying the command's stderr. The child is
/// killed if the returned future is dropped (e.g. the surrounding poll was
/// cancelled).
pub async fn run_capture(program: &str, args: &[String]) -> Result<String> {
    debug!(program, ?args, "running log command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawning log command '{program}'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "log command '{} {}' exited with {}: {}",
            program,
            args.join(" "),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
