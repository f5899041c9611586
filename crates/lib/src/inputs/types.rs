//! Input types for declaration and resolution.
//!
//! This module defines the types used on both sides of input resolution:
//! - [`InputRole`] and [`DependencyRef`] - what a package declares
//! - [`InputDecls`] - the per-package declaration table
//! - [`InputEntry`] and [`InputTable`] - what the executor supplies per build

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_OUTPUT;

/// How a dependency participates in a build.
///
/// Declaration order of the variants is the search order used when a
/// lookup is not restricted to one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputRole {
  /// Needed at build time and linked into the result.
  Required,
  /// Needed by the result at run time and by anything that depends on it.
  Propagated,
  /// Build-time tools (compilers, code generators) that run on the build host.
  Native,
}

impl InputRole {
  pub const ALL: [InputRole; 3] = [InputRole::Required, InputRole::Propagated, InputRole::Native];

  pub fn as_str(self) -> &'static str {
    match self {
      InputRole::Required => "required",
      InputRole::Propagated => "propagated",
      InputRole::Native => "native",
    }
  }
}

impl fmt::Display for InputRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown input role '{0}' (expected required, propagated or native)")]
pub struct UnknownRole(pub String);

impl FromStr for InputRole {
  type Err = UnknownRole;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "required" => Ok(InputRole::Required),
      "propagated" => Ok(InputRole::Propagated),
      "native" => Ok(InputRole::Native),
      other => Err(UnknownRole(other.to_string())),
    }
  }
}

/// A symbolic dependency name plus an optional output selector.
///
/// Written as `"name"` or `"name:output"` in recipes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyRef {
  pub name: String,
  pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dependency reference '{0}'")]
pub struct InvalidDependencyRef(pub String);

impl DependencyRef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      output: None,
    }
  }

  pub fn with_output(mut self, output: impl Into<String>) -> Self {
    self.output = Some(output.into());
    self
  }

  /// The output this reference resolves to when no selector overrides it.
  pub fn output_or_default(&self) -> &str {
    self.output.as_deref().unwrap_or(DEFAULT_OUTPUT)
  }
}

impl FromStr for DependencyRef {
  type Err = InvalidDependencyRef;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (name, output) = match s.split_once(':') {
      Some((name, output)) => (name, Some(output)),
      None => (s, None),
    };

    if name.is_empty() || output.is_some_and(|o| o.is_empty() || o.contains(':')) {
      return Err(InvalidDependencyRef(s.to_string()));
    }

    Ok(Self {
      name: name.to_string(),
      output: output.map(str::to_string),
    })
  }
}

impl TryFrom<String> for DependencyRef {
  type Error = InvalidDependencyRef;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<DependencyRef> for String {
  fn from(dep: DependencyRef) -> Self {
    dep.to_string()
  }
}

impl fmt::Display for DependencyRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.output {
      Some(output) => write!(f, "{}:{}", self.name, output),
      None => write!(f, "{}", self.name),
    }
  }
}

/// Declared dependencies of one package, by role.
pub type InputDecls = BTreeMap<InputRole, Vec<DependencyRef>>;

/// A concrete input supplied by the executor.
///
/// Single-output dependencies are a plain path (exposed as the `out` output);
/// multi-output dependencies map output names to paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputEntry {
  Path(PathBuf),
  Outputs(BTreeMap<String, PathBuf>),
}

impl InputEntry {
  /// Look up one output by name.
  pub fn output(&self, name: &str) -> Option<&Path> {
    match self {
      InputEntry::Path(path) if name == DEFAULT_OUTPUT => Some(path),
      InputEntry::Path(_) => None,
      InputEntry::Outputs(outputs) => outputs.get(name).map(PathBuf::as_path),
    }
  }

  /// All outputs of this entry, as owned `(name, path)` pairs.
  pub fn outputs(&self) -> BTreeMap<String, PathBuf> {
    match self {
      InputEntry::Path(path) => BTreeMap::from([(DEFAULT_OUTPUT.to_string(), path.clone())]),
      InputEntry::Outputs(outputs) => outputs.clone(),
    }
  }
}

impl From<PathBuf> for InputEntry {
  fn from(path: PathBuf) -> Self {
    InputEntry::Path(path)
  }
}

impl From<&str> for InputEntry {
  fn from(path: &str) -> Self {
    InputEntry::Path(PathBuf::from(path))
  }
}

/// Errors loading an input table.
#[derive(Debug, Error)]
pub enum InputTableError {
  #[error("failed to read input table {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse input table: {0}")]
  Parse(#[from] serde_json::Error),
}

/// The finalized `role -> name -> path(s)` table for one build.
///
/// This is the only way resolution learns about concrete paths; nothing in
/// this crate discovers inputs on its own.
///
/// ```json
/// {
///   "required": { "zlib": "/store/zlib-1.2" },
///   "native": { "gcc": { "out": "/store/gcc-13", "lib": "/store/gcc-13-lib" } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputTable(BTreeMap<InputRole, BTreeMap<String, InputEntry>>);

impl InputTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an input, replacing any previous entry with the same role and name.
  pub fn insert(&mut self, role: InputRole, name: impl Into<String>, entry: impl Into<InputEntry>) {
    self.0.entry(role).or_default().insert(name.into(), entry.into());
  }

  /// Builder-style [`insert`](Self::insert).
  pub fn with_input(mut self, role: InputRole, name: impl Into<String>, entry: impl Into<InputEntry>) -> Self {
    self.insert(role, name, entry);
    self
  }

  pub fn get(&self, role: InputRole, name: &str) -> Option<&InputEntry> {
    self.0.get(&role).and_then(|inputs| inputs.get(name))
  }

  pub fn from_json_str(json: &str) -> Result<Self, InputTableError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn load(path: &Path) -> Result<Self, InputTableError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputTableError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content)
  }
}
