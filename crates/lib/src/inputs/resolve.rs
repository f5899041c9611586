//! Resolution of declared inputs against an executor-supplied table.
//!
//! Resolution happens once per build, before any phase runs:
//! [`InputResolver::resolve_all`] checks every declaration and returns
//! [`ResolvedInputs`], which phases then query. Both lookups are pure: the
//! same `(role, name, output)` always yields the same path within a build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::types::{DependencyRef, InputDecls, InputRole, InputTable};
use crate::consts::PATH_LIST_SEPARATOR;

/// Errors that can occur during input resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  /// The name is not declared, or the executor supplied no path for it.
  #[error("unresolved input '{name}'{}", role_suffix(.role))]
  Unresolved { role: Option<InputRole>, name: String },

  /// The input exists but does not expose the requested output.
  #[error("unknown output '{output}' for input '{name}' (available: {})", .available.join(", "))]
  UnknownOutput {
    name: String,
    output: String,
    available: Vec<String>,
  },
}

fn role_suffix(role: &Option<InputRole>) -> String {
  match role {
    Some(role) => format!(" (role {role})"),
    None => String::new(),
  }
}

/// Resolves a package's declarations against one build's [`InputTable`].
pub struct InputResolver<'a> {
  decls: &'a InputDecls,
  table: &'a InputTable,
}

impl<'a> InputResolver<'a> {
  pub fn new(decls: &'a InputDecls, table: &'a InputTable) -> Self {
    Self { decls, table }
  }

  /// Resolve one declared input to a path.
  ///
  /// `role` restricts the lookup to one role; `None` searches all roles.
  /// `output` overrides the output named in the declaration, which itself
  /// defaults to `out`.
  pub fn resolve(&self, role: Option<InputRole>, name: &str, output: Option<&str>) -> Result<&'a Path, ResolveError> {
    let (declared_role, dep) = self.find_decl(role, name)?;
    let entry = self
      .table
      .get(declared_role, name)
      .ok_or_else(|| ResolveError::Unresolved {
        role: Some(declared_role),
        name: name.to_string(),
      })?;

    let selector = output.unwrap_or_else(|| dep.output_or_default());
    entry.output(selector).ok_or_else(|| ResolveError::UnknownOutput {
      name: name.to_string(),
      output: selector.to_string(),
      available: entry.outputs().into_keys().collect(),
    })
  }

  /// Resolve every declaration, failing on the first one that cannot be.
  pub fn resolve_all(&self) -> Result<ResolvedInputs, ResolveError> {
    let mut inputs = Vec::new();

    for (role, deps) in self.decls {
      for dep in deps {
        let path = self.resolve(Some(*role), &dep.name, None)?;
        debug!(role = %role, input = %dep, path = ?path, "resolved input");

        // Resolve succeeded, so the entry exists.
        let outputs = self
          .table
          .get(*role, &dep.name)
          .map(|entry| entry.outputs())
          .unwrap_or_default();

        inputs.push(ResolvedInput {
          role: *role,
          name: dep.name.clone(),
          default_output: dep.output_or_default().to_string(),
          outputs,
        });
      }
    }

    info!(count = inputs.len(), "inputs resolved");
    Ok(ResolvedInputs { inputs })
  }

  fn find_decl(&self, role: Option<InputRole>, name: &str) -> Result<(InputRole, &'a DependencyRef), ResolveError> {
    self
      .decls
      .iter()
      .filter(|(r, _)| role.is_none_or(|wanted| wanted == **r))
      .find_map(|(r, deps)| deps.iter().find(|d| d.name == name).map(|d| (*r, d)))
      .ok_or_else(|| ResolveError::Unresolved {
        role,
        name: name.to_string(),
      })
  }
}

/// One fully resolved input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
  pub role: InputRole,
  pub name: String,
  /// Output used when a lookup does not select one.
  pub default_output: String,
  pub outputs: BTreeMap<String, PathBuf>,
}

impl ResolvedInput {
  pub fn default_path(&self) -> Option<&Path> {
    self.outputs.get(&self.default_output).map(PathBuf::as_path)
  }
}

/// The validated `role -> name -> path` mapping handed to phases.
///
/// Built once per build by [`InputResolver::resolve_all`] and discarded with
/// the build; nothing is cached across builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedInputs {
  inputs: Vec<ResolvedInput>,
}

impl ResolvedInputs {
  /// Look up a resolved input with the same semantics as
  /// [`InputResolver::resolve`].
  pub fn resolve(&self, role: Option<InputRole>, name: &str, output: Option<&str>) -> Result<&Path, ResolveError> {
    let input = self
      .inputs
      .iter()
      .find(|i| i.name == name && role.is_none_or(|r| r == i.role))
      .ok_or_else(|| ResolveError::Unresolved {
        role,
        name: name.to_string(),
      })?;

    let selector = output.unwrap_or(input.default_output.as_str());
    input
      .outputs
      .get(selector)
      .map(PathBuf::as_path)
      .ok_or_else(|| ResolveError::UnknownOutput {
        name: name.to_string(),
        output: selector.to_string(),
        available: input.outputs.keys().cloned().collect(),
      })
  }

  pub fn iter(&self) -> std::slice::Iter<'_, ResolvedInput> {
    self.inputs.iter()
  }

  pub fn len(&self) -> usize {
    self.inputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inputs.is_empty()
  }

  /// Find the first input whose default output contains `relative`
  /// (for example `bin/perl`), in role then declaration order.
  pub fn search_file(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
    let relative = relative.as_ref();
    self
      .inputs
      .iter()
      .filter_map(ResolvedInput::default_path)
      .map(|root| root.join(relative))
      .find(|candidate| candidate.exists())
  }

  /// Search-path environment variables derived from the inputs' outputs.
  ///
  /// Only directories that exist are included. Variables with no entries
  /// are omitted.
  pub fn search_env(&self) -> BTreeMap<String, String> {
    const SEARCH_PATHS: &[(&str, &[&str])] = &[
      ("PATH", &["bin", "sbin"]),
      ("C_INCLUDE_PATH", &["include"]),
      ("CPLUS_INCLUDE_PATH", &["include"]),
      ("LIBRARY_PATH", &["lib"]),
      ("PKG_CONFIG_PATH", &["lib/pkgconfig", "share/pkgconfig"]),
    ];

    let mut env = BTreeMap::new();
    for (var, subdirs) in SEARCH_PATHS {
      let mut entries: Vec<String> = Vec::new();
      for input in &self.inputs {
        for root in input.outputs.values() {
          for subdir in *subdirs {
            let dir = root.join(subdir);
            if !dir.is_dir() {
              continue;
            }
            let dir = dir.to_string_lossy().into_owned();
            if !entries.contains(&dir) {
              entries.push(dir);
            }
          }
        }
      }
      if !entries.is_empty() {
        env.insert(var.to_string(), entries.join(PATH_LIST_SEPARATOR));
      }
    }
    env
  }
}
