//! Test utilities for phasekit-lib.
//!
//! Helpers for tests that need real files, executables and recipes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::action::Action;
use crate::execute::{ExecuteConfig, PhaseCtx};
use crate::inputs::{DependencyRef, InputDecls, InputResolver, InputRole, InputTable, ResolvedInputs};
use crate::package::{FetchMethod, PackageId, PackageSpec, SourceDescriptor};

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  write_file(path, &format!("#!/bin/sh\n{body}\n"));
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path.to_path_buf()
}

/// A source descriptor with a well-formed digest.
pub fn sample_source() -> SourceDescriptor {
  SourceDescriptor {
    method: FetchMethod::Url,
    location: "https://example.org/hello-{version}.tar.gz".to_string(),
    reference: None,
    sha256: "a".repeat(64),
  }
}

/// A package using the given build system with no inputs or edits.
pub fn sample_package(name: &str, build_system: &str) -> PackageSpec {
  PackageSpec::new(name, "1.0", sample_source(), build_system)
}

/// An action that appends the phase name to `<out>/trace` when it runs.
pub fn trace_action(label: &'static str) -> Action {
  Action::native(label, move |ctx| {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(ctx.out_dir.join("trace"))?;
    writeln!(file, "{label}")?;
    Ok(())
  })
}

/// Read back the phases recorded by [`trace_action`].
pub fn read_trace(out_dir: &Path) -> Vec<String> {
  std::fs::read_to_string(out_dir.join("trace"))
    .map(|s| s.lines().map(str::to_string).collect())
    .unwrap_or_default()
}

/// Owns everything a [`PhaseCtx`] borrows.
pub struct TestCtx {
  pub package: PackageId,
  pub inputs: ResolvedInputs,
  pub search_env: BTreeMap<String, String>,
  pub config: ExecuteConfig,
  pub work_dir: PathBuf,
  pub out_dir: PathBuf,
  decls: InputDecls,
  table: InputTable,
}

impl TestCtx {
  pub fn new(work_dir: &Path, out_dir: &Path) -> Self {
    Self {
      package: PackageId::new("hello", "1.0"),
      inputs: ResolvedInputs::default(),
      search_env: BTreeMap::new(),
      config: ExecuteConfig::default(),
      work_dir: work_dir.to_path_buf(),
      out_dir: out_dir.to_path_buf(),
      decls: InputDecls::new(),
      table: InputTable::new(),
    }
  }

  /// Declare and supply an input, then re-resolve.
  pub fn with_input(mut self, role: InputRole, name: &str, path: &str) -> Self {
    self.decls.entry(role).or_default().push(DependencyRef::new(name));
    self.table.insert(role, name, path);
    self.inputs = InputResolver::new(&self.decls, &self.table).resolve_all().unwrap();
    self.search_env = self.inputs.search_env();
    self
  }

  pub fn ctx(&self) -> PhaseCtx<'_> {
    PhaseCtx {
      package: &self.package,
      inputs: &self.inputs,
      out_dir: &self.out_dir,
      work_dir: self.work_dir.clone(),
      search_env: &self.search_env,
      config: &self.config,
    }
  }
}
