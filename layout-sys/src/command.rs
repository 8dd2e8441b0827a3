// SPDX-License-Identifier: GPL-3.0-only

//! External tool invocation

use std::io::Write;
use std::process::{Command, Output, Stdio};

use layout_types::Report;

use crate::{Result, SysError};

/// Run a read-only query and return its stdout
pub fn run_command(command: &str, args: &[&str]) -> Result<String> {
    let output = spawn(command, args, None)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SysError::OperationFailed(format!(
            "{command} failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a mutating command, logging it and its output into `report`.
///
/// Exit codes listed in `accepted` count as success; an empty list means
/// only zero.
pub fn run_logged(
    report: &mut Report,
    command: &str,
    args: &[&str],
    stdin: Option<&str>,
    accepted: &[i32],
) -> Result<String> {
    report.line(format!("{command} {}", args.join(" ")));
    let output = spawn(command, args, stdin)?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stdout.lines().chain(stderr.lines()) {
        if !line.trim().is_empty() {
            report.line(line.to_string());
        }
    }

    let code = output.status.code();
    let ok = match code {
        Some(0) => true,
        Some(code) => accepted.contains(&code),
        None => false,
    };
    if !ok {
        return Err(SysError::OperationFailed(format!(
            "{command} exited with {}",
            code.map_or_else(|| "a signal".to_string(), |code| code.to_string())
        )));
    }
    Ok(stdout)
}

/// Fail early with `ToolMissing` when `tool` is not on `PATH`
pub fn require_tool(tool: &str) -> Result<()> {
    if which::which(tool).is_err() {
        return Err(SysError::ToolMissing(tool.to_string()));
    }
    Ok(())
}

fn spawn(command: &str, args: &[&str], stdin: Option<&str>) -> Result<Output> {
    tracing::debug!(%command, ?args, "running tool");
    let mut child = Command::new(command)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => SysError::ToolMissing(command.to_string()),
            _ => SysError::Io(err),
        })?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes())?;
        }
    }

    Ok(child.wait_with_output()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_exit_codes_count_as_success() {
        let mut report = Report::new("test");
        let result = run_logged(&mut report, "sh", &["-c", "exit 1"], None, &[0, 1, 2]);
        assert!(result.is_ok());
        assert_eq!(report.lines[0], "sh -c exit 1");

        let result = run_logged(&mut report, "sh", &["-c", "exit 4"], None, &[0, 1, 2]);
        assert!(matches!(result, Err(SysError::OperationFailed(_))));
    }

    #[test]
    fn stdin_and_output_are_captured() {
        let mut report = Report::new("test");
        let out = run_logged(&mut report, "cat", &[], Some("start=2048\n"), &[])
            .expect("cat echoes stdin");
        assert_eq!(out, "start=2048\n");
        assert!(report.lines.contains(&"start=2048".to_string()));
    }

    #[test]
    fn missing_tools_are_reported_as_such() {
        let err = run_command("definitely-not-a-layout-tool", &[]).err();
        assert!(matches!(err, Some(SysError::ToolMissing(_))));
    }
}
