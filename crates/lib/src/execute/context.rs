//! The context handed to every phase action.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::inputs::ResolvedInputs;
use crate::package::PackageId;
use crate::placeholder::{PlaceholderError, Resolver};

use super::types::ExecuteConfig;

/// Everything an action may use: the resolved inputs, the output root and
/// the working directory.
///
/// The working directory is the only mutable part; an action that changes
/// it (such as unpacking into a subdirectory) changes it for every later
/// phase of the same build.
#[derive(Debug)]
pub struct PhaseCtx<'a> {
  pub package: &'a PackageId,
  pub inputs: &'a ResolvedInputs,
  pub out_dir: &'a Path,
  pub work_dir: PathBuf,
  /// Search-path variables derived from `inputs`, computed once per build.
  pub search_env: &'a BTreeMap<String, String>,
  pub config: &'a ExecuteConfig,
}

impl PhaseCtx<'_> {
  /// Resolve `path` against the working directory. Absolute paths are
  /// returned unchanged.
  pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
    self.work_dir.join(path)
  }
}

impl Resolver for PhaseCtx<'_> {
  fn resolve_out(&self) -> Result<String, PlaceholderError> {
    Ok(self.out_dir.to_string_lossy().into_owned())
  }

  fn resolve_source(&self) -> Result<String, PlaceholderError> {
    Ok(self.work_dir.to_string_lossy().into_owned())
  }

  fn resolve_input(&self, name: &str, output: Option<&str>) -> Result<String, PlaceholderError> {
    self
      .inputs
      .resolve(None, name, output)
      .map(|path| path.to_string_lossy().into_owned())
      .map_err(|e| PlaceholderError::UnresolvedInput {
        name: name.to_string(),
        message: e.to_string(),
      })
  }
}
