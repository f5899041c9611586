//! Implementation of the `phasekit check` command.
//!
//! Validates every package in a catalog and materializes its pipeline
//! against the built-in build systems, without building anything.

use std::path::Path;

use anyhow::{Context, Result, bail};

use phasekit_lib::build_system::BuildSystemRegistry;
use phasekit_lib::execute::{ExecuteConfig, materialize_pipeline};
use phasekit_lib::package::Catalog;

use crate::output::{print_error, print_success};

pub fn cmd_check(catalog_path: &Path, config: &ExecuteConfig) -> Result<()> {
  let catalog =
    Catalog::load(catalog_path).with_context(|| format!("Failed to load catalog: {}", catalog_path.display()))?;
  let registry = BuildSystemRegistry::with_builtins();

  let mut failures = 0;
  for spec in &catalog {
    let checked = spec.validate(&registry).map_err(anyhow::Error::from).and_then(|()| {
      let system = registry
        .get(&spec.build_system)
        .with_context(|| format!("unknown build system '{}'", spec.build_system))?;
      Ok(materialize_pipeline(spec, system, config)?)
    });

    match checked {
      Ok(pipeline) => print_success(&format!("{} ({} phases)", spec.id(), pipeline.len())),
      Err(e) => {
        failures += 1;
        print_error(&format!("{}: {:#}", spec.id(), e));
      }
    }
  }

  if failures > 0 {
    bail!("{} of {} package(s) failed the check", failures, catalog.len());
  }

  println!("Checked {} package(s)", catalog.len());
  Ok(())
}
