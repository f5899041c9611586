use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::actions::install::InstallEntry;
use crate::build_system::BuildSystemRegistry;
use crate::inputs::{DependencyRef, InputDecls, InputRole};
use crate::phase::PhaseEdit;
use crate::util::hash::Hashable;

/// Alphabet of Nix-style base32 digests (no `e`, `o`, `u`, `t`).
const NIX_BASE32_CHARS: &str = "0123456789abcdfghijklmnpqrsvwxyz";

/// How the external fetcher retrieves a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
  Url,
  Git,
}

/// Where a package's source comes from.
///
/// This crate never fetches anything; the descriptor is handed to an
/// external fetcher, and the build receives the unpacked directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
  pub method: FetchMethod,
  /// URL or repository location; `{version}` is replaced by the package version.
  pub location: String,
  /// Git commit or tag. Also a template.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference: Option<String>,
  /// SHA-256 of the fetched content, hex or Nix base32.
  pub sha256: String,
}

impl SourceDescriptor {
  pub fn location_for(&self, version: &str) -> String {
    self.location.replace("{version}", version)
  }

  pub fn reference_for(&self, version: &str) -> Option<String> {
    self.reference.as_ref().map(|r| r.replace("{version}", version))
  }

  fn digest_is_valid(&self) -> bool {
    let d = self.sha256.as_str();
    (d.len() == 64 && d.chars().all(|c| c.is_ascii_hexdigit()))
      || (d.len() == 52 && d.chars().all(|c| NIX_BASE32_CHARS.contains(c)))
  }
}

/// Parameters build systems read when constructing their default phases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildArguments {
  /// Extra arguments for `./configure`.
  pub configure_flags: Vec<String>,
  /// Extra arguments for every `make` invocation.
  pub make_flags: Vec<String>,
  /// Whether the check phase runs the test suite.
  pub tests: bool,
  pub parallel_build: bool,
  /// Copies performed by the `copy` build system's install phase.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub install_plan: Option<Vec<InstallEntry>>,
}

impl Default for BuildArguments {
  fn default() -> Self {
    Self {
      configure_flags: Vec::new(),
      make_flags: Vec::new(),
      tests: true,
      parallel_build: true,
      install_plan: None,
    }
  }
}

/// `name@version`, the identity of a [`PackageSpec`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
  pub name: String,
  pub version: String,
}

impl PackageId {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.name, self.version)
  }
}

/// Errors from [`PackageSpec::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
  #[error("package name is empty")]
  EmptyName,

  #[error("package {0} has an empty version")]
  EmptyVersion(String),

  #[error("package {id}: malformed sha256 digest '{digest}'")]
  InvalidDigest { id: String, digest: String },

  #[error("package {id}: input '{name}' is declared more than once")]
  DuplicateInput { id: String, name: String },

  #[error("package {id}: unknown build system '{build_system}'")]
  UnknownBuildSystem { id: String, build_system: String },
}

/// The declarative description of one package.
///
/// A spec is plain data: build systems and customizations derive a new
/// [`PhaseList`](crate::phase::PhaseList) from it for each build, and
/// nothing in a build writes back to it.
///
/// ```json
/// {
///   "name": "hello",
///   "version": "2.12",
///   "source": { "method": "url", "location": "https://ftp.gnu.org/gnu/hello/hello-{version}.tar.gz",
///               "sha256": "..." },
///   "build_system": "gnu",
///   "inputs": { "native": ["perl"] },
///   "phases": [{ "op": "delete", "key": "check" }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
  pub name: String,
  pub version: String,
  pub source: SourceDescriptor,
  pub build_system: String,
  #[serde(default)]
  pub arguments: BuildArguments,
  #[serde(default, skip_serializing_if = "InputDecls::is_empty")]
  pub inputs: InputDecls,
  /// Customization script applied to the build system's default phases.
  #[serde(default, rename = "phases", skip_serializing_if = "Vec::is_empty")]
  pub phase_edits: Vec<PhaseEdit>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub synopsis: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub home_page: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,
}

impl Hashable for PackageSpec {}

impl PackageSpec {
  pub fn new(
    name: impl Into<String>,
    version: impl Into<String>,
    source: SourceDescriptor,
    build_system: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      source,
      build_system: build_system.into(),
      arguments: BuildArguments::default(),
      inputs: InputDecls::new(),
      phase_edits: Vec::new(),
      synopsis: None,
      description: None,
      home_page: None,
      license: None,
    }
  }

  pub fn with_input(mut self, role: InputRole, dep: DependencyRef) -> Self {
    self.inputs.entry(role).or_default().push(dep);
    self
  }

  pub fn with_edit(mut self, edit: PhaseEdit) -> Self {
    self.phase_edits.push(edit);
    self
  }

  pub fn with_arguments(mut self, arguments: BuildArguments) -> Self {
    self.arguments = arguments;
    self
  }

  pub fn id(&self) -> PackageId {
    PackageId::new(&self.name, &self.version)
  }

  /// Check the spec against everything that can be known before a build.
  ///
  /// Customization scripts are checked later, when the pipeline is
  /// materialized against the build system's default phases.
  pub fn validate(&self, registry: &BuildSystemRegistry) -> Result<(), PackageError> {
    if self.name.trim().is_empty() {
      return Err(PackageError::EmptyName);
    }
    let id = self.id().to_string();
    if self.version.trim().is_empty() {
      return Err(PackageError::EmptyVersion(self.name.clone()));
    }
    if !self.source.digest_is_valid() {
      return Err(PackageError::InvalidDigest {
        id,
        digest: self.source.sha256.clone(),
      });
    }

    let mut seen = BTreeSet::new();
    for dep in self.inputs.values().flatten() {
      if !seen.insert(dep.name.as_str()) {
        return Err(PackageError::DuplicateInput {
          id,
          name: dep.name.clone(),
        });
      }
    }

    if registry.get(&self.build_system).is_none() {
      return Err(PackageError::UnknownBuildSystem {
        id,
        build_system: self.build_system.clone(),
      });
    }

    Ok(())
  }
}

/// Compare dotted version strings component by component.
///
/// Numeric components compare as numbers, others as text; a numeric
/// component sorts after a textual one, and a longer version after its
/// prefix (`1.2 < 1.2.1`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
  let mut left = a.split(['.', '-']);
  let mut right = b.split(['.', '-']);

  loop {
    match (left.next(), right.next()) {
      (None, None) => return Ordering::Equal,
      (None, Some(_)) => return Ordering::Less,
      (Some(_), None) => return Ordering::Greater,
      (Some(x), Some(y)) => {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
          (Ok(x), Ok(y)) => x.cmp(&y),
          (Ok(_), Err(_)) => Ordering::Greater,
          (Err(_), Ok(_)) => Ordering::Less,
          (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
          return ord;
        }
      }
    }
  }
}
