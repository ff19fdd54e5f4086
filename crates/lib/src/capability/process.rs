//! External process execution for capability implementations.
//!
//! Commands are spawned directly (never through a shell) with the caller's
//! environment, since the tools rely on the user's keystore and auth state.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::CapabilityError;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
  /// Exit code, `None` when terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Render a command line for logs and error messages.
pub fn display_cmd(program: &str, args: &[&str]) -> String {
  std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
}

/// Run a command to completion, optionally feeding `stdin`.
///
/// Non-zero exit codes are returned, not treated as errors.
pub async fn run(program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput, CapabilityError> {
  let cmd = display_cmd(program, args);
  debug!(cmd = %cmd, "spawning process");

  let mut command = Command::new(program);
  command
    .args(args)
    .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let mut child = command.spawn().map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      CapabilityError::MissingTool(program.to_string())
    } else {
      CapabilityError::Spawn {
        cmd: cmd.clone(),
        source: e,
      }
    }
  })?;

  if let Some(input) = stdin {
    if let Some(mut pipe) = child.stdin.take() {
      pipe.write_all(input.as_bytes()).await?;
      pipe.shutdown().await?;
    }
  }

  let output = child.wait_with_output().await?;
  let result = CommandOutput {
    code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  };

  if !result.stderr.is_empty() {
    debug!(stderr = %result.stderr.trim(), "command stderr");
  }
  debug!(cmd = %cmd, code = ?result.code, "process finished");

  Ok(result)
}

/// Run a command and fail unless it exits with status 0. Returns stdout.
pub async fn run_checked(program: &str, args: &[&str], stdin: Option<&str>) -> Result<String, CapabilityError> {
  let output = run(program, args, stdin).await?;
  if !output.success() {
    return Err(CapabilityError::CommandFailed {
      cmd: display_cmd(program, args),
      code: output.code,
      stderr: output.stderr.trim().to_string(),
    });
  }
  Ok(output.stdout)
}
