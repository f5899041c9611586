//! Install plans: copying build results into the output root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::action::ActionError;

/// One `from -> to` copy of an install plan.
///
/// `from` is relative to the working directory; `to` is relative to the
/// output root. A `to` that is empty or ends in `/` names a directory the
/// source is copied into; otherwise it names the destination itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallEntry {
  pub from: String,
  #[serde(default)]
  pub to: String,
}

impl InstallEntry {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
    }
  }
}

/// Execute an install plan. Entries are applied in order.
pub fn install_plan(plan: &[InstallEntry], work_dir: &Path, out_dir: &Path) -> Result<usize, ActionError> {
  let mut copied = 0;

  for entry in plan {
    check_contained(&entry.from)?;
    check_contained(&entry.to)?;

    let source = work_dir.join(&entry.from);
    if !source.exists() && source.symlink_metadata().is_err() {
      return Err(ActionError::InstallSourceMissing(source));
    }

    let into_dir = entry.to.is_empty() || entry.to.ends_with('/');
    let target_base = out_dir.join(&entry.to);

    if source.is_dir() {
      // Directory contents land directly in the target directory.
      copied += copy_tree(&source, &target_base)?;
    } else {
      let target = if into_dir {
        let name = source
          .file_name()
          .ok_or_else(|| ActionError::InstallSourceMissing(source.clone()))?;
        target_base.join(name)
      } else {
        target_base
      };
      copy_entry(&source, &target)?;
      copied += 1;
    }

    debug!(from = %entry.from, to = %entry.to, "installed");
  }

  Ok(copied)
}

/// Plan paths must stay inside the directory they are relative to.
fn check_contained(path: &str) -> Result<(), ActionError> {
  let escapes = Path::new(path)
    .components()
    .any(|c| matches!(c, Component::RootDir | Component::Prefix(_) | Component::ParentDir));
  if escapes {
    return Err(ActionError::InstallPathEscapes(path.to_string()));
  }
  Ok(())
}

/// Copy a directory tree, returning the number of files and links copied.
fn copy_tree(source: &Path, target: &Path) -> Result<usize, ActionError> {
  let mut copied = 0;
  fs::create_dir_all(target)?;

  for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| ActionError::Io(e.into()))?;
    let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
    let dest = target.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&dest)?;
    } else {
      copy_entry(entry.path(), &dest)?;
      copied += 1;
    }
  }

  Ok(copied)
}

/// Copy one file or symlink, creating parent directories.
fn copy_entry(source: &Path, dest: &Path) -> Result<(), ActionError> {
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent)?;
  }

  let metadata = fs::symlink_metadata(source)?;
  if metadata.file_type().is_symlink() {
    let link_target: PathBuf = fs::read_link(source)?;
    if dest.symlink_metadata().is_ok() {
      fs::remove_file(dest)?;
    }
    create_symlink(&link_target, dest)?;
  } else {
    // fs::copy preserves permission bits.
    fs::copy(source, dest)?;
  }

  Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
