use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::actions::exec::ExecOpts;
use crate::action::actions::install::InstallEntry;
use crate::execute::PhaseCtx;
use crate::placeholder::PlaceholderError;
use crate::substitute::{SubstituteError, SubstitutionRule};
use crate::wrap::{EnvEdit, WrapError};

/// The work a phase performs.
///
/// Every variant except [`Native`](Action::Native) is plain data and can be
/// written in recipes:
///
/// ```json
/// { "kind": "substitute", "files": ["Makefile"],
///   "rules": [{ "pattern": "/usr/bin/perl", "replacement": "$${input:perl}/bin/perl" }] }
/// ```
///
/// String fields of data variants may contain placeholders (see
/// [`crate::placeholder`]); they are resolved just before the action runs.
/// Relative paths are taken relative to the phase's working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
  /// Enter the unpacked source tree.
  ///
  /// If the working directory holds exactly one entry and it is a
  /// directory, that directory becomes the working directory.
  Unpack,

  /// Run a binary with arguments, without a shell.
  Exec(ExecOpts),

  /// Run a script with the build shell.
  Shell {
    script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cwd: Option<String>,
  },

  /// Apply substitution rules to files; every rule must match in every file.
  Substitute {
    files: Vec<String>,
    rules: Vec<SubstitutionRule>,
  },

  /// Install a launcher that adjusts the environment of `program`.
  Wrap { program: String, edits: Vec<EnvEdit> },

  /// Copy files from the working directory into the output root.
  Install { plan: Vec<InstallEntry> },

  /// Do nothing.
  Noop,

  /// A function value supplied from Rust code.
  #[serde(skip)]
  Native(PhaseFn),
}

impl Action {
  /// Shell script action with no extra environment.
  pub fn shell(script: impl Into<String>) -> Self {
    Action::Shell {
      script: script.into(),
      env: None,
      cwd: None,
    }
  }

  pub fn substitute<F, S>(files: F, rules: Vec<SubstitutionRule>) -> Self
  where
    F: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Action::Substitute {
      files: files.into_iter().map(Into::into).collect(),
      rules,
    }
  }

  pub fn wrap(program: impl Into<String>, edits: Vec<EnvEdit>) -> Self {
    Action::Wrap {
      program: program.into(),
      edits,
    }
  }

  pub fn native<F>(name: impl Into<String>, f: F) -> Self
  where
    F: Fn(&mut PhaseCtx<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
  {
    Action::Native(PhaseFn::new(name, f))
  }

  /// Short name of the variant, for logs.
  pub fn kind(&self) -> &'static str {
    match self {
      Action::Unpack => "unpack",
      Action::Exec(_) => "exec",
      Action::Shell { .. } => "shell",
      Action::Substitute { .. } => "substitute",
      Action::Wrap { .. } => "wrap",
      Action::Install { .. } => "install",
      Action::Noop => "noop",
      Action::Native(_) => "native",
    }
  }
}

type PhaseFnBody = dyn Fn(&mut PhaseCtx<'_>) -> Result<(), ActionError> + Send + Sync;

/// A named function used as a phase action.
///
/// The function receives the build context explicitly; it must not rely on
/// state captured from elsewhere in the build.
#[derive(Clone)]
pub struct PhaseFn {
  name: String,
  body: Arc<PhaseFnBody>,
}

impl PhaseFn {
  pub fn new<F>(name: impl Into<String>, f: F) -> Self
  where
    F: Fn(&mut PhaseCtx<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      body: Arc::new(f),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn call(&self, ctx: &mut PhaseCtx<'_>) -> Result<(), ActionError> {
    (self.body)(ctx)
  }
}

impl fmt::Debug for PhaseFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("PhaseFn").field(&self.name).finish()
  }
}

/// Two function values are equal only if they share the same body.
impl PartialEq for PhaseFn {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name && Arc::ptr_eq(&self.body, &other.body)
  }
}

/// Errors an action can report.
#[derive(Debug, Error)]
pub enum ActionError {
  #[error("placeholder error: {0}")]
  Placeholder(#[from] PlaceholderError),

  /// The command ran and exited unsuccessfully.
  #[error("command failed with exit code {:?}: {}{}", .code, .cmd, stderr_tail(.stderr))]
  CmdFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error(transparent)]
  Substitute(#[from] SubstituteError),

  #[error(transparent)]
  Wrap(#[from] WrapError),

  #[error("source directory {} is missing or not a directory", .0.display())]
  SourceMissing(PathBuf),

  #[error("install source {} does not exist", .0.display())]
  InstallSourceMissing(PathBuf),

  /// An install plan path is absolute or climbs out with `..`.
  #[error("install path '{0}' leaves the build directories")]
  InstallPathEscapes(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Failure reported by a native action.
  #[error("{0}")]
  Failed(String),
}

/// Last few lines of stderr, formatted for an error message.
fn stderr_tail(stderr: &str) -> String {
  const TAIL_LINES: usize = 10;

  let lines: Vec<&str> = stderr.trim_end().lines().collect();
  if lines.is_empty() {
    return String::new();
  }
  let start = lines.len().saturating_sub(TAIL_LINES);
  format!("\n{}", lines[start..].join("\n"))
}
