//! Implementation of the `phasekit phases` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use phasekit_lib::build_system::BuildSystemRegistry;
use phasekit_lib::execute::{ExecuteConfig, materialize_pipeline};
use phasekit_lib::package::Catalog;

use crate::output::{OutputFormat, format_phase_line, print_json};

#[derive(Serialize)]
struct PhaseEntry<'a> {
  key: &'a str,
  action: &'static str,
}

/// Print the final phase order of a package, after its customizations.
pub fn cmd_phases(
  catalog_path: &Path,
  name: &str,
  version: Option<&str>,
  output: OutputFormat,
  config: &ExecuteConfig,
) -> Result<()> {
  let catalog =
    Catalog::load(catalog_path).with_context(|| format!("Failed to load catalog: {}", catalog_path.display()))?;
  let spec = catalog.find(name, version)?;

  let registry = BuildSystemRegistry::with_builtins();
  spec.validate(&registry)?;
  let system = registry
    .get(&spec.build_system)
    .with_context(|| format!("unknown build system '{}'", spec.build_system))?;
  let pipeline =
    materialize_pipeline(spec, system, config).with_context(|| format!("Failed to materialize {}", spec.id()))?;

  if output.is_json() {
    let entries: Vec<PhaseEntry<'_>> = pipeline
      .iter()
      .map(|phase| PhaseEntry {
        key: phase.key.as_str(),
        action: phase.action.kind(),
      })
      .collect();
    return print_json(&entries);
  }

  println!("{} ({})", spec.id(), spec.build_system);
  for (index, phase) in pipeline.iter().enumerate() {
    println!("  {}", format_phase_line(index, phase.key.as_str(), phase.action.kind()));
  }

  Ok(())
}
