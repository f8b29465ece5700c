// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blocking invocation of external tools with a wall-clock bound.

use std::io::Read;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use satzwerk_core::error::{Result, SatzwerkError};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn tool_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// A non-zero exit status is an error carrying the tool's stderr. Stderr is
/// drained while the tool runs so a full pipe never stalls it.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<()> {
    let tool = tool_name(&cmd);
    debug!(command = ?cmd, "running external tool");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| SatzwerkError::ExternalTool {
            tool: tool.clone(),
            reason: format!("failed to start: {}", err),
        })?;
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                stop(&mut child, &tool);
                return Err(SatzwerkError::ExternalTool {
                    tool,
                    reason: format!("timed out after {}s", timeout.as_secs()),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                stop(&mut child, &tool);
                return Err(SatzwerkError::ExternalTool {
                    tool,
                    reason: format!("wait failed: {}", err),
                });
            }
        }
    };

    if status.success() {
        return Ok(());
    }
    let stderr = stderr.join().unwrap_or_else(|_| {
        warn!(tool = %tool, "stderr reader panicked");
        String::new()
    });
    Err(SatzwerkError::ExternalTool {
        tool,
        reason: format!("exited with {}: {}", status, stderr.trim()),
    })
}

/// Read the pipe to its end on a separate thread.
fn drain(pipe: Option<ChildStderr>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe
            && let Err(err) = pipe.read_to_string(&mut text)
        {
            debug!(%err, "stderr not fully read");
        }
        text
    })
}

/// Kill and reap a tool that is being abandoned.
fn stop(child: &mut Child, tool: &str) {
    if let Err(err) = child.kill() {
        warn!(tool, %err, "failed to kill external tool");
    }
    match child.wait() {
        Ok(status) => debug!(tool, %status, "external tool reaped"),
        Err(err) => warn!(tool, %err, "failed to reap external tool"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_commands_return_ok() {
        let cmd = Command::new("true");
        run_with_timeout(cmd, Duration::from_secs(5)).expect("true succeeds");
    }

    #[test]
    fn failing_commands_report_the_tool() {
        let cmd = Command::new("false");
        let err = run_with_timeout(cmd, Duration::from_secs(5)).expect_err("false fails");
        assert!(matches!(err, SatzwerkError::ExternalTool { ref tool, .. } if tool == "false"));
    }

    #[test]
    fn stderr_is_reported_on_failure() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_with_timeout(cmd, Duration::from_secs(5)).expect_err("exit 3");
        assert!(err.to_string().contains("boom"), "{}", err);
    }

    #[test]
    fn chatty_tools_are_not_stalled_by_a_full_pipe() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "yes x | head -c 1000000 >&2"]);
        let started = Instant::now();
        run_with_timeout(cmd, Duration::from_secs(10)).expect("finishes");
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[test]
    fn slow_commands_are_killed() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(cmd, Duration::from_millis(100)).expect_err("times out");
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_executables_fail_to_start() {
        let cmd = Command::new("/nonexistent/satzwerk-tool");
        let err = run_with_timeout(cmd, Duration::from_secs(1)).expect_err("missing");
        assert!(err.to_string().contains("failed to start"));
    }
}
