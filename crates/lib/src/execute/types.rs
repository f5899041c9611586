//! Types for build execution.
//!
//! Configuration, the build state machine's states, results and errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::action::ActionError;
use crate::inputs::ResolveError;
use crate::package::{PackageError, PackageId};
use crate::phase::{CustomizationError, PhaseKey, PhaseListError};
use crate::substitute::SubstituteError;
use crate::util::hash::{ContentHash, DirHashError};

/// Configuration for build execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteConfig {
  /// Shell used for shell-script actions.
  /// If None, uses /bin/sh (Unix) or powershell.exe (Windows).
  pub shell: Option<String>,

  /// Append the host `PATH` after the input-derived search path.
  pub keep_host_path: bool,

  /// Parallel jobs passed to build tools that support them.
  pub jobs: usize,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      shell: None,
      keep_host_path: false,
      jobs: num_cpus(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Where one build reads its source and writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirs {
  /// The unpacked source tree; the initial working directory.
  pub source: PathBuf,
  /// The output root handed to actions as `$${out}`.
  pub out: PathBuf,
}

impl BuildDirs {
  pub fn new(source: impl Into<PathBuf>, out: impl Into<PathBuf>) -> Self {
    Self {
      source: source.into(),
      out: out.into(),
    }
  }

  /// Make both directories absolute against the current directory.
  ///
  /// Actions see `out` through `$${out}` after the working directory has
  /// moved, so a relative root would point somewhere else.
  pub fn to_absolute(&self) -> std::io::Result<Self> {
    Ok(Self {
      source: std::path::absolute(&self.source)?,
      out: std::path::absolute(&self.out)?,
    })
  }
}

/// States of one build.
///
/// ```text
/// Declared -> InputsResolved -> PipelineMaterialized -> Executing -> Succeeded
///                                                                  \-> Failed
/// ```
///
/// Any failed transition also ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
  Declared,
  InputsResolved,
  PipelineMaterialized,
  Executing,
  Succeeded,
  Failed,
}

impl BuildState {
  pub fn is_terminal(self) -> bool {
    matches!(self, BuildState::Succeeded | BuildState::Failed)
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BuildState::Declared => "declared",
      BuildState::InputsResolved => "inputs-resolved",
      BuildState::PipelineMaterialized => "pipeline-materialized",
      BuildState::Executing => "executing",
      BuildState::Succeeded => "succeeded",
      BuildState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
  pub package: PackageId,
  pub out_dir: PathBuf,
  /// Working directory after the last phase ran.
  pub work_dir: PathBuf,
  /// Phases in the order they ran.
  pub phases: Vec<PhaseKey>,
  /// Hash of the output tree.
  pub output_hash: ContentHash,
}

/// Errors that can occur during a build.
///
/// Every error stops the build. Errors raised while a phase runs carry that
/// phase's key.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A declared input could not be resolved. No phase ran.
  #[error("unresolved input: {0}")]
  UnresolvedInput(#[from] ResolveError),

  /// The customization script does not apply to the default phases. No phase ran.
  #[error("invalid customization: {0}")]
  InvalidCustomization(#[from] CustomizationError),

  /// A substitution pattern matched nothing.
  #[error("phase '{phase}' failed: {source}")]
  SubstitutionNotFound {
    phase: PhaseKey,
    #[source]
    source: SubstituteError,
  },

  /// An action reported failure.
  #[error("phase '{phase}' failed: {source}")]
  ActionFailure {
    phase: PhaseKey,
    #[source]
    source: ActionError,
  },

  #[error("unknown build system '{0}'")]
  UnknownBuildSystem(String),

  /// The build system's constructor produced an invalid list.
  #[error("build system '{name}' produced invalid phases: {source}")]
  InvalidBuildSystem {
    name: String,
    #[source]
    source: PhaseListError,
  },

  #[error("invalid package: {0}")]
  InvalidPackage(#[from] PackageError),

  /// A state machine operation was called out of order.
  #[error("cannot {operation} in state {state}")]
  InvalidState { operation: &'static str, state: BuildState },

  /// Preparing or finishing the output directory failed.
  #[error("failed to prepare {}: {source}", .path.display())]
  Prepare {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to hash output: {0}")]
  Hash(#[from] DirHashError),
}

impl BuildError {
  /// Classify an action failure in `phase`.
  pub(crate) fn from_action(phase: PhaseKey, error: ActionError) -> Self {
    match error {
      ActionError::Substitute(source @ SubstituteError::NotFound { .. }) => {
        BuildError::SubstitutionNotFound { phase, source }
      }
      source => BuildError::ActionFailure { phase, source },
    }
  }

  /// Key of the phase that failed, for errors raised while executing.
  pub fn phase(&self) -> Option<&PhaseKey> {
    match self {
      BuildError::SubstitutionNotFound { phase, .. } | BuildError::ActionFailure { phase, .. } => Some(phase),
      _ => None,
    }
  }
}
