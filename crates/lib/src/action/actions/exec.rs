//! Command execution.
//!
//! Commands run with a cleared environment so that builds only see what
//! their declared inputs provide.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::action::ActionError;
use crate::consts::{BUILD_TMP_DIR, SOURCE_DATE_EPOCH};
use crate::execute::PhaseCtx;

/// Options for running a binary directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecOpts {
  pub bin: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<String>,
}

impl ExecOpts {
  pub fn new(bin: impl Into<String>) -> Self {
    Self {
      bin: bin.into(),
      args: None,
      env: None,
      cwd: None,
    }
  }

  pub fn with_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = Some(args.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = Some(env);
    self
  }

  pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }
}

impl From<&str> for ExecOpts {
  fn from(bin: &str) -> Self {
    ExecOpts::new(bin)
  }
}

/// Run `bin` with `args` in the build's isolated environment.
///
/// The environment is cleared, then set to:
/// - `PATH` and the other search paths derived from the resolved inputs
///   (`/path-not-set` when no input provides a `bin` directory)
/// - `HOME=/homeless-shelter`
/// - `TMPDIR`/`TMP`/`TEMP`/`TEMPDIR` inside the output root
/// - `out` set to the output root
/// - `LANG=C`, `LC_ALL=C` and a fixed `SOURCE_DATE_EPOCH`
///
/// `env` is merged last and wins. `cwd` defaults to the phase's working
/// directory.
///
/// Returns trimmed stdout on success.
pub async fn execute_cmd(
  bin: &str,
  args: &[String],
  env: Option<&BTreeMap<String, String>>,
  cwd: Option<&Path>,
  ctx: &PhaseCtx<'_>,
) -> Result<String, ActionError> {
  let cmd = display_cmd(bin, args);
  info!(cmd = %cmd, "executing command");

  let tmp_dir = ctx.out_dir.join(BUILD_TMP_DIR);
  tokio::fs::create_dir_all(&tmp_dir).await?;

  let working_dir = cwd.unwrap_or(ctx.work_dir.as_path());

  let mut command = Command::new(bin);
  command
    .args(args)
    .current_dir(working_dir)
    .env_clear()
    .env("PATH", search_path(ctx))
    .env("HOME", "/homeless-shelter")
    .env("TMPDIR", &tmp_dir)
    .env("TMP", &tmp_dir)
    .env("TEMP", &tmp_dir)
    .env("TEMPDIR", &tmp_dir)
    .env("out", ctx.out_dir)
    .env("LANG", "C")
    .env("LC_ALL", "C")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH);

  for (key, value) in ctx.search_env {
    if key != "PATH" {
      command.env(key, value);
    }
  }

  if let Some(user_env) = env {
    command.envs(user_env);
  }

  debug!(working_dir = ?working_dir, "spawning process");

  let output = command.output().await?;
  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
    warn!(cmd = %cmd, code = ?output.status.code(), "command failed");

    return Err(ActionError::CmdFailed {
      cmd,
      code: output.status.code(),
      stderr,
    });
  }

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

/// Run a script with the configured build shell.
pub async fn execute_shell(
  script: &str,
  env: Option<&BTreeMap<String, String>>,
  cwd: Option<&Path>,
  ctx: &PhaseCtx<'_>,
) -> Result<String, ActionError> {
  let (shell, mut args) = get_shell(ctx.config.shell.as_deref());
  args.push(script.to_string());
  execute_cmd(&shell, &args, env, cwd, ctx).await
}

/// `PATH` for commands: input search path, then the host `PATH` if allowed.
fn search_path(ctx: &PhaseCtx<'_>) -> String {
  let mut parts: Vec<String> = ctx.search_env.get("PATH").cloned().into_iter().collect();

  if ctx.config.keep_host_path {
    if let Ok(host) = std::env::var("PATH") {
      parts.push(host);
    }
  }

  if parts.is_empty() {
    "/path-not-set".to_string()
  } else {
    parts.join(crate::consts::PATH_LIST_SEPARATOR)
  }
}

fn display_cmd(bin: &str, args: &[String]) -> String {
  if args.is_empty() {
    bin.to_string()
  } else {
    format!("{} {}", bin, args.join(" "))
  }
}

/// Get the shell command and arguments for the current platform.
///
/// The default is `/bin/sh` (Unix) or `powershell.exe` (Windows) rather
/// than the user's `$SHELL`: interactive shells source profile files that
/// modify the environment and break isolation.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}
