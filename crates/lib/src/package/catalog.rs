//! Package catalogs.
//!
//! A catalog is a JSON file listing package specs:
//!
//! ```json
//! { "packages": [ { "name": "hello", "version": "2.12", ... } ] }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{PackageError, PackageId, PackageSpec, compare_versions};
use crate::build_system::BuildSystemRegistry;

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("failed to read catalog {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse catalog: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("package {0} is defined more than once")]
  Duplicate(PackageId),

  #[error("package '{name}'{} not found", .version.as_ref().map(|v| format!(" version {v}")).unwrap_or_default())]
  NotFound { name: String, version: Option<String> },

  #[error(transparent)]
  Invalid(#[from] PackageError),
}

#[derive(Deserialize, Serialize)]
struct CatalogFile {
  packages: Vec<PackageSpec>,
}

/// A read-only collection of package specs, unique by `name@version`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
  packages: Vec<PackageSpec>,
}

impl Catalog {
  /// Build a catalog, rejecting duplicate identities.
  pub fn from_specs(specs: impl IntoIterator<Item = PackageSpec>) -> Result<Self, CatalogError> {
    let mut packages: Vec<PackageSpec> = Vec::new();
    for spec in specs {
      let id = spec.id();
      if packages.iter().any(|p| p.id() == id) {
        return Err(CatalogError::Duplicate(id));
      }
      packages.push(spec);
    }
    Ok(Self { packages })
  }

  pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
    let file: CatalogFile = serde_json::from_str(json)?;
    Self::from_specs(file.packages)
  }

  pub fn load(path: &Path) -> Result<Self, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let catalog = Self::from_json_str(&content)?;
    info!(path = ?path, packages = catalog.len(), "catalog loaded");
    Ok(catalog)
  }

  pub fn to_json_string(&self) -> Result<String, CatalogError> {
    let file = CatalogFile {
      packages: self.packages.clone(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, PackageSpec> {
    self.packages.iter()
  }

  /// Find a package by name.
  ///
  /// With a version, only an exact match is returned; without one, the
  /// greatest version of that name.
  pub fn find(&self, name: &str, version: Option<&str>) -> Result<&PackageSpec, CatalogError> {
    let found = self
      .packages
      .iter()
      .filter(|p| p.name == name)
      .filter(|p| version.is_none_or(|v| p.version == v))
      .max_by(|a, b| compare_versions(&a.version, &b.version));

    debug!(name, version, found = found.is_some(), "catalog lookup");
    found.ok_or_else(|| CatalogError::NotFound {
      name: name.to_string(),
      version: version.map(str::to_string),
    })
  }

  /// Validate every spec against `registry`.
  pub fn validate(&self, registry: &BuildSystemRegistry) -> Result<(), CatalogError> {
    for spec in &self.packages {
      spec.validate(registry)?;
    }
    Ok(())
  }
}

impl<'a> IntoIterator for &'a Catalog {
  type Item = &'a PackageSpec;
  type IntoIter = std::slice::Iter<'a, PackageSpec>;

  fn into_iter(self) -> Self::IntoIter {
    self.packages.iter()
  }
}
