//! Program wrapping.
//!
//! [`wrap_program`] moves an executable aside to `.NAME-real` and installs a
//! small `sh` launcher at its original path. The launcher edits the inherited
//! environment, then `exec`s the real program with all original arguments,
//! so no extra process remains and the exit status is the program's own.
//!
//! Wrapping an already wrapped program appends the new edits to the existing
//! launcher, after the earlier ones.
//!
//! ```text
//! #!/bin/sh
//! # phasekit wrapper: edit the variables above the exec line
//! if [ -n "${PATH:-}" ]; then PATH=/store/coreutils/bin:"$PATH"; else PATH=/store/coreutils/bin; fi
//! export PATH
//! exec /store/tool/bin/.tool-real "$@"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEFAULT_WRAPPER_SHELL, PATH_LIST_SEPARATOR, WRAPPER_MARKER};
use crate::util::shell::quote;

/// How an [`EnvEdit`] combines its values with the inherited variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
  /// Put the values in front of the inherited value.
  Prefix,
  /// Put the values after the inherited value.
  Suffix,
  /// Replace the inherited value.
  Set,
}

/// One environment edit applied by a launcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvEdit {
  pub var: String,
  pub mode: WrapMode,
  /// Fragments joined with `separator`, in order.
  pub values: Vec<String>,
  #[serde(default = "default_separator")]
  pub separator: String,
}

fn default_separator() -> String {
  PATH_LIST_SEPARATOR.to_string()
}

impl EnvEdit {
  pub fn new<I, S>(var: impl Into<String>, mode: WrapMode, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      var: var.into(),
      mode,
      values: values.into_iter().map(Into::into).collect(),
      separator: default_separator(),
    }
  }

  pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
    self.separator = separator.into();
    self
  }

  fn validate(&self) -> Result<(), WrapError> {
    let mut chars = self.var.chars();
    let valid = chars
      .next()
      .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
      && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
      return Err(WrapError::InvalidVariable(self.var.clone()));
    }
    if self.values.is_empty() && self.mode != WrapMode::Set {
      return Err(WrapError::EmptyValues(self.var.clone()));
    }
    Ok(())
  }

  /// Shell lines performing this edit.
  fn script_lines(&self) -> Vec<String> {
    let var = &self.var;
    let value = quote(&self.values.join(&self.separator));
    let sep = quote(&self.separator);

    match self.mode {
      WrapMode::Set => vec![format!("export {var}={value}")],
      WrapMode::Prefix => vec![
        format!(r#"if [ -n "${{{var}:-}}" ]; then {var}={value}{sep}"${var}"; else {var}={value}; fi"#),
        format!("export {var}"),
      ],
      WrapMode::Suffix => vec![
        format!(r#"if [ -n "${{{var}:-}}" ]; then {var}="${var}"{sep}{value}; else {var}={value}; fi"#),
        format!("export {var}"),
      ],
    }
  }
}

/// Options for writing launchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOptions {
  /// Interpreter named in the launcher's `#!` line.
  pub interpreter: PathBuf,
}

impl Default for WrapOptions {
  fn default() -> Self {
    Self {
      interpreter: PathBuf::from(DEFAULT_WRAPPER_SHELL),
    }
  }
}

/// Errors that can occur while wrapping a program.
#[derive(Debug, Error)]
pub enum WrapError {
  #[error("program {} does not exist", .0.display())]
  ProgramMissing(PathBuf),

  #[error("invalid environment variable name '{0}'")]
  InvalidVariable(String),

  #[error("no values given for environment variable '{0}'")]
  EmptyValues(String),

  /// `.NAME-real` exists but the program is not one of our launchers.
  #[error("{} exists but {} is not a wrapper", .real.display(), .program.display())]
  NotWrapper { program: PathBuf, real: PathBuf },

  #[error("failed to write wrapper {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Where [`wrap_program`] moves the original executable.
pub fn real_program_path(program: &Path) -> PathBuf {
  let name = program
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  program.with_file_name(format!(".{name}-real"))
}

/// Wrap `program` so that it runs with `edits` applied to its environment.
///
/// Returns the absolute path of the real executable.
pub fn wrap_program(program: &Path, edits: &[EnvEdit], options: &WrapOptions) -> Result<PathBuf, WrapError> {
  for edit in edits {
    edit.validate()?;
  }
  if !program.is_file() {
    return Err(WrapError::ProgramMissing(program.to_path_buf()));
  }

  let io_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source| WrapError::Io { path, source }
  };

  // The launcher must find the real program from any working directory.
  let program = &std::path::absolute(program).map_err(io_err(program))?;
  let real = real_program_path(program);
  let new_lines: Vec<String> = edits.iter().flat_map(EnvEdit::script_lines).collect();

  let script = if real.exists() {
    let existing = std::fs::read_to_string(program).map_err(io_err(program))?;
    if !existing.lines().any(|line| line == WRAPPER_MARKER) {
      return Err(WrapError::NotWrapper {
        program: program.to_path_buf(),
        real,
      });
    }
    debug!(program = ?program, edits = edits.len(), "extending existing wrapper");
    extend_launcher(&existing, &new_lines)
  } else {
    std::fs::rename(program, &real).map_err(io_err(&real))?;
    launcher(&options.interpreter, &real, &new_lines)
  };

  std::fs::write(program, script).map_err(io_err(program))?;
  make_executable(program).map_err(io_err(program))?;

  info!(program = ?program, real = ?real, "program wrapped");
  Ok(real)
}

fn launcher(interpreter: &Path, real: &Path, lines: &[String]) -> String {
  let mut script = format!("#!{}\n{WRAPPER_MARKER}\n", interpreter.display());
  for line in lines {
    script.push_str(line);
    script.push('\n');
  }
  script.push_str(&format!("exec {} \"$@\"\n", quote(&real.to_string_lossy())));
  script
}

/// Insert `lines` just before the launcher's `exec` line.
fn extend_launcher(existing: &str, lines: &[String]) -> String {
  let mut out: Vec<&str> = existing.lines().collect();
  let exec_at = out
    .iter()
    .rposition(|line| line.starts_with("exec "))
    .unwrap_or(out.len());
  out.splice(exec_at..exec_at, lines.iter().map(String::as_str));
  let mut script = out.join("\n");
  script.push('\n');
  script
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
  Ok(())
}
