//! Implementation of the `phasekit build` command.
//!
//! Runs the whole build of one package: resolve inputs from the given input
//! table, materialize the pipeline, then execute its phases against an
//! already unpacked source tree.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use phasekit_lib::build_system::BuildSystemRegistry;
use phasekit_lib::execute::{BuildDirs, ExecuteConfig, realize};
use phasekit_lib::inputs::InputTable;
use phasekit_lib::package::Catalog;
use phasekit_lib::util::hash::Hashable;

use crate::output::{print_error, print_stat, print_success};

pub struct BuildArgs {
  pub catalog: PathBuf,
  pub name: String,
  pub version: Option<String>,
  pub source: PathBuf,
  pub inputs: Option<PathBuf>,
  pub out: Option<PathBuf>,
  pub store: PathBuf,
}

pub fn cmd_build(args: &BuildArgs, config: &ExecuteConfig) -> Result<()> {
  let catalog =
    Catalog::load(&args.catalog).with_context(|| format!("Failed to load catalog: {}", args.catalog.display()))?;
  let spec = catalog.find(&args.name, args.version.as_deref())?;

  let table = match &args.inputs {
    Some(path) => InputTable::load(path).with_context(|| format!("Failed to load inputs: {}", path.display()))?,
    None => InputTable::new(),
  };

  let out = match &args.out {
    Some(out) => out.clone(),
    None => {
      let hash = spec.compute_hash().context("Failed to compute package hash")?;
      args.store.join(format!("{}-{}-{}", hash, spec.name, spec.version))
    }
  };
  info!(package = %spec.id(), out = %out.display(), "building");

  let dirs = BuildDirs::new(&args.source, &out);
  let registry = BuildSystemRegistry::with_builtins();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let result = match rt.block_on(realize(spec, &registry, &table, &dirs, config)) {
    Ok(result) => result,
    Err(e) => {
      match e.phase() {
        Some(phase) => print_error(&format!("{} failed in phase '{}'", spec.id(), phase)),
        None => print_error(&format!("{} failed before any phase ran", spec.id())),
      }
      return Err(e).context("Build failed");
    }
  };

  print_success(&format!("Built {}", result.package));
  print_stat("Output", &result.out_dir.display().to_string());
  print_stat("Phases", &result.phases.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "));
  print_stat("Hash", &result.output_hash.to_string());
  let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
  print_stat("Time", &humantime::format_duration(elapsed).to_string());

  Ok(())
}
