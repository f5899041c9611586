//! Hashing helpers.
//!
//! - `ObjectHash`: truncated digest of a serializable value, used to name
//!   output directories
//! - `ContentHash`: full digest of a directory tree, recorded for finished builds

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

/// A truncated SHA-256 of a value's JSON form (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, serde_json::Error> {
    let serialized = serde_json::to_string(self)?;
    let digest = format!("{:x}", Sha256::digest(serialized.as_bytes()));
    Ok(ObjectHash(digest[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 over file contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash a directory tree: relative paths, file contents and symlink targets.
///
/// Timestamps and permissions are ignored. Entries whose file name is in
/// `exclude` are skipped at any depth, together with their contents.
pub fn hash_directory(root: &Path, exclude: &[&str]) -> Result<ContentHash, DirHashError> {
  let walker = WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name().to_str().is_none_or(|name| !exclude.contains(&name)));

  let mut hasher = Sha256::new();

  for entry in walker {
    let entry = entry?;
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_string_lossy().to_string();
    if rel.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(|source| DirHashError::Read {
        path: entry.path().display().to_string(),
        source,
      })?;
      format!("L:{}:{}", rel, target.to_string_lossy())
    } else if file_type.is_dir() {
      format!("D:{}", rel)
    } else if file_type.is_file() {
      format!("F:{}:{}", rel, hash_file(entry.path())?)
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash one file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let read_err = |source| DirHashError::Read {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let n = file.read(&mut buffer).map_err(read_err)?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}
