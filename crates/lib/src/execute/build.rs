//! The per-build state machine.
//!
//! A [`BuildRun`] walks one [`PackageSpec`] through
//! `Declared -> InputsResolved -> PipelineMaterialized -> Executing` and
//! finally `Succeeded` or `Failed`. Each step must succeed before the next
//! may be attempted, and the first failure moves the run to `Failed` for
//! good. Nothing a run computes outlives it.

use std::path::Path;

use tracing::{debug, error, info};

use crate::action::execute_action;
use crate::build_system::{BuildSystem, BuildSystemRegistry};
use crate::consts::BUILD_TMP_DIR;
use crate::inputs::{InputResolver, InputTable, ResolvedInputs};
use crate::package::{PackageId, PackageSpec};
use crate::phase::{PhaseKey, PhaseList, customize};
use crate::util::hash::hash_directory;

use super::context::PhaseCtx;
use super::types::{BuildDirs, BuildError, BuildResult, BuildState, ExecuteConfig};

/// Derive the final pipeline of `spec` from `system`'s default phases.
///
/// This does not touch inputs or the filesystem, so it can be used to
/// inspect or check a package without building it.
pub fn materialize_pipeline(
  spec: &PackageSpec,
  system: &BuildSystem,
  config: &ExecuteConfig,
) -> Result<PhaseList, BuildError> {
  let base = system
    .default_phases(&spec.arguments, config)
    .map_err(|source| BuildError::InvalidBuildSystem {
      name: system.name().to_string(),
      source,
    })?;
  Ok(customize(&base, &spec.phase_edits)?)
}

/// One build of one package.
#[derive(Debug)]
pub struct BuildRun<'a> {
  spec: &'a PackageSpec,
  id: PackageId,
  state: BuildState,
  inputs: Option<ResolvedInputs>,
  pipeline: Option<PhaseList>,
  completed: Vec<PhaseKey>,
}

impl<'a> BuildRun<'a> {
  pub fn new(spec: &'a PackageSpec) -> Self {
    Self {
      spec,
      id: spec.id(),
      state: BuildState::Declared,
      inputs: None,
      pipeline: None,
      completed: Vec::new(),
    }
  }

  pub fn state(&self) -> BuildState {
    self.state
  }

  pub fn package(&self) -> &PackageId {
    &self.id
  }

  pub fn inputs(&self) -> Option<&ResolvedInputs> {
    self.inputs.as_ref()
  }

  pub fn pipeline(&self) -> Option<&PhaseList> {
    self.pipeline.as_ref()
  }

  /// Phases that finished successfully, in order.
  pub fn completed_phases(&self) -> &[PhaseKey] {
    &self.completed
  }

  /// `Declared -> InputsResolved`.
  pub fn resolve_inputs(&mut self, table: &InputTable) -> Result<(), BuildError> {
    self.expect(BuildState::Declared, "resolve inputs")?;

    match InputResolver::new(&self.spec.inputs, table).resolve_all() {
      Ok(inputs) => {
        self.inputs = Some(inputs);
        self.transition(BuildState::InputsResolved);
        Ok(())
      }
      Err(e) => Err(self.fail(e.into())),
    }
  }

  /// `InputsResolved -> PipelineMaterialized`.
  pub fn materialize(&mut self, system: &BuildSystem, config: &ExecuteConfig) -> Result<(), BuildError> {
    self.expect(BuildState::InputsResolved, "materialize the pipeline")?;

    match materialize_pipeline(self.spec, system, config) {
      Ok(pipeline) => {
        let keys: Vec<&str> = pipeline.keys().map(PhaseKey::as_str).collect();
        debug!(package = %self.id, phases = ?keys, "pipeline materialized");
        self.pipeline = Some(pipeline);
        self.transition(BuildState::PipelineMaterialized);
        Ok(())
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  /// `PipelineMaterialized -> Executing -> Succeeded | Failed`.
  ///
  /// Phases run strictly in order; the first failing phase stops the build
  /// and no later phase runs. Files written by earlier phases are left in
  /// place.
  pub async fn execute(&mut self, dirs: &BuildDirs, config: &ExecuteConfig) -> Result<BuildResult, BuildError> {
    self.expect(BuildState::PipelineMaterialized, "execute")?;

    if let Err(source) = std::fs::create_dir_all(&dirs.out) {
      return Err(self.fail(BuildError::Prepare {
        path: dirs.out.clone(),
        source,
      }));
    }
    let dirs = match dirs.to_absolute() {
      Ok(dirs) => dirs,
      Err(source) => {
        return Err(self.fail(BuildError::Prepare {
          path: dirs.out.clone(),
          source,
        }));
      }
    };

    let (Some(inputs), Some(pipeline)) = (self.inputs.take(), self.pipeline.clone()) else {
      return Err(self.fail(BuildError::InvalidState {
        operation: "execute",
        state: self.state,
      }));
    };
    let search_env = inputs.search_env();
    self.transition(BuildState::Executing);

    let mut ctx = PhaseCtx {
      package: &self.id,
      inputs: &inputs,
      out_dir: &dirs.out,
      work_dir: dirs.source.clone(),
      search_env: &search_env,
      config,
    };

    let mut failure = None;
    for phase in &pipeline {
      info!(package = %ctx.package, phase = %phase.key, action = phase.action.kind(), "starting phase");
      match execute_action(&phase.action, &mut ctx).await {
        Ok(()) => self.completed.push(phase.key.clone()),
        Err(e) => {
          error!(package = %ctx.package, phase = %phase.key, error = %e, "phase failed");
          failure = Some(BuildError::from_action(phase.key.clone(), e));
          break;
        }
      }
    }
    let work_dir = ctx.work_dir;
    self.inputs = Some(inputs);

    if let Some(e) = failure {
      return Err(self.fail(e));
    }

    match finish(&dirs.out) {
      Ok(output_hash) => {
        self.transition(BuildState::Succeeded);
        Ok(BuildResult {
          package: self.id.clone(),
          out_dir: dirs.out.clone(),
          work_dir,
          phases: self.completed.clone(),
          output_hash,
        })
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  fn expect(&self, expected: BuildState, operation: &'static str) -> Result<(), BuildError> {
    if self.state == expected {
      return Ok(());
    }
    Err(BuildError::InvalidState {
      operation,
      state: self.state,
    })
  }

  fn transition(&mut self, to: BuildState) {
    info!(package = %self.id, from = %self.state, to = %to, "build state changed");
    self.state = to;
  }

  fn fail(&mut self, error: BuildError) -> BuildError {
    self.transition(BuildState::Failed);
    error
  }
}

/// Remove the build's temporary directory and hash the output tree.
fn finish(out: &Path) -> Result<crate::util::hash::ContentHash, BuildError> {
  let tmp = out.join(BUILD_TMP_DIR);
  if tmp.exists() {
    std::fs::remove_dir_all(&tmp).map_err(|source| BuildError::Prepare { path: tmp, source })?;
  }
  Ok(hash_directory(out, &[BUILD_TMP_DIR])?)
}

/// Run the whole state machine for `spec`.
///
/// The spec is validated, its build system looked up in `registry`, its
/// inputs resolved against `table`, and its pipeline materialized before
/// any phase runs.
pub async fn realize(
  spec: &PackageSpec,
  registry: &BuildSystemRegistry,
  table: &InputTable,
  dirs: &BuildDirs,
  config: &ExecuteConfig,
) -> Result<BuildResult, BuildError> {
  spec.validate(registry)?;
  let system = registry
    .get(&spec.build_system)
    .ok_or_else(|| BuildError::UnknownBuildSystem(spec.build_system.clone()))?;

  let mut run = BuildRun::new(spec);
  run.resolve_inputs(table)?;
  run.materialize(system, config)?;
  let result = run.execute(dirs, config).await?;

  info!(package = %result.package, out = ?result.out_dir, hash = %result.output_hash, "build succeeded");
  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::action::Action;
  use crate::inputs::{DependencyRef, InputRole, ResolveError};
  use crate::phase::PhaseEdit;
  use crate::substitute::{SubstituteError, SubstitutionRule};
  use crate::util::testutil::{read_trace, sample_package, trace_action, write_file};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  /// `[unpack, configure, build, install]`, each phase recording itself.
  fn traced_system() -> BuildSystem {
    BuildSystem::new("traced", |_, _| {
      PhaseList::from_phases([
        ("unpack", trace_action("unpack")),
        ("configure", trace_action("configure")),
        ("build", trace_action("build")),
        ("install", trace_action("install")),
      ])
    })
  }

  fn patch_paths(pattern: &str) -> PhaseEdit {
    PhaseEdit::insert_after(
      "build",
      "patch-paths",
      Action::substitute(["Makefile"], vec![SubstitutionRule::new(pattern, "/run/current-system/bin/pwd")]),
    )
  }

  fn keys(list: &PhaseList) -> Vec<&str> {
    list.keys().map(PhaseKey::as_str).collect()
  }

  struct Fixture {
    _temp: TempDir,
    dirs: BuildDirs,
  }

  fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let dirs = BuildDirs::new(temp.path().join("source"), temp.path().join("out"));
    write_file(&dirs.source.join("Makefile"), "PWD = /bin/pwd\n");
    Fixture { _temp: temp, dirs }
  }

  #[tokio::test]
  async fn missing_pattern_stops_build_at_patch_phase() {
    let f = fixture();
    let spec = sample_package("hello", "traced")
      .with_edit(PhaseEdit::delete("configure"))
      .with_edit(patch_paths("/usr/bin/pwd"));
    let config = ExecuteConfig::default();
    let mut run = BuildRun::new(&spec);

    run.resolve_inputs(&InputTable::new()).unwrap();
    run.materialize(&traced_system(), &config).unwrap();
    assert_eq!(
      keys(run.pipeline().unwrap()),
      vec!["unpack", "build", "patch-paths", "install"]
    );

    let err = run.execute(&f.dirs, &config).await.unwrap_err();

    assert!(matches!(err, BuildError::SubstitutionNotFound { .. }));
    assert_eq!(err.phase().map(PhaseKey::as_str), Some("patch-paths"));
    assert_eq!(run.state(), BuildState::Failed);
    assert_eq!(read_trace(&f.dirs.out), vec!["unpack", "build"]);
    assert_eq!(run.completed_phases(), &[PhaseKey::new("unpack"), PhaseKey::new("build")]);
  }

  #[tokio::test]
  async fn successful_build_runs_every_phase() {
    let f = fixture();
    let spec = sample_package("hello", "traced")
      .with_edit(PhaseEdit::delete("configure"))
      .with_edit(patch_paths("/bin/pwd"));
    let config = ExecuteConfig::default();
    let mut run = BuildRun::new(&spec);

    run.resolve_inputs(&InputTable::new()).unwrap();
    run.materialize(&traced_system(), &config).unwrap();
    let result = run.execute(&f.dirs, &config).await.unwrap();

    assert_eq!(run.state(), BuildState::Succeeded);
    assert_eq!(read_trace(&f.dirs.out), vec!["unpack", "build", "install"]);
    assert_eq!(result.phases.len(), 4);
    assert_eq!(result.work_dir, f.dirs.source);
    assert_eq!(result.output_hash.0.len(), 64);
    assert_eq!(
      std::fs::read_to_string(f.dirs.source.join("Makefile")).unwrap(),
      "PWD = /run/current-system/bin/pwd\n"
    );
  }

  #[tokio::test]
  async fn unresolved_input_fails_before_any_phase() {
    let f = fixture();
    let spec = sample_package("hello", "traced").with_input(InputRole::Required, DependencyRef::new("openssl"));
    let table = InputTable::new().with_input(InputRole::Required, "zlib", "/store/zlib-1.2");
    let mut run = BuildRun::new(&spec);

    let err = run.resolve_inputs(&table).unwrap_err();

    assert!(matches!(
      err,
      BuildError::UnresolvedInput(ResolveError::Unresolved { ref name, .. }) if name == "openssl"
    ));
    assert_eq!(run.state(), BuildState::Failed);
    assert!(!f.dirs.out.exists());
  }

  #[test]
  fn invalid_customization_fails_materialization() {
    let spec = sample_package("hello", "traced")
      .with_edit(PhaseEdit::delete("configure"))
      .with_edit(PhaseEdit::insert_after("configure", "pre-build", Action::Noop));
    let mut run = BuildRun::new(&spec);
    run.resolve_inputs(&InputTable::new()).unwrap();

    let err = run.materialize(&traced_system(), &ExecuteConfig::default()).unwrap_err();

    match err {
      BuildError::InvalidCustomization(e) => assert_eq!(e.index, 1),
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(run.state(), BuildState::Failed);
    assert!(run.pipeline().is_none());
  }

  #[tokio::test]
  async fn steps_must_run_in_order() {
    let f = fixture();
    let spec = sample_package("hello", "traced");
    let config = ExecuteConfig::default();
    let mut run = BuildRun::new(&spec);

    let err = run.execute(&f.dirs, &config).await.unwrap_err();
    assert!(matches!(
      err,
      BuildError::InvalidState {
        state: BuildState::Declared,
        ..
      }
    ));

    let err = run.materialize(&traced_system(), &config).unwrap_err();
    assert!(matches!(err, BuildError::InvalidState { .. }));
    // Out-of-order calls do not change the state.
    assert_eq!(run.state(), BuildState::Declared);
  }

  #[test]
  fn failed_run_cannot_be_resumed() {
    let spec = sample_package("hello", "traced").with_input(InputRole::Native, DependencyRef::new("perl"));
    let mut run = BuildRun::new(&spec);
    run.resolve_inputs(&InputTable::new()).unwrap_err();

    let err = run.resolve_inputs(&InputTable::new()).unwrap_err();

    assert!(matches!(
      err,
      BuildError::InvalidState {
        state: BuildState::Failed,
        ..
      }
    ));
  }

  #[test]
  fn shared_build_system_is_not_modified() {
    let system = traced_system();
    let config = ExecuteConfig::default();
    let customized = sample_package("a", "traced").with_edit(PhaseEdit::delete("configure"));
    let plain = sample_package("b", "traced");

    let first = materialize_pipeline(&customized, &system, &config).unwrap();
    let second = materialize_pipeline(&plain, &system, &config).unwrap();

    assert_eq!(keys(&first), vec!["unpack", "build", "install"]);
    assert_eq!(keys(&second), vec!["unpack", "configure", "build", "install"]);
  }

  #[tokio::test]
  async fn realize_rejects_invalid_package() {
    let f = fixture();
    let spec = sample_package("hello", "cmake");

    let err = realize(
      &spec,
      &BuildSystemRegistry::with_builtins(),
      &InputTable::new(),
      &f.dirs,
      &ExecuteConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BuildError::InvalidPackage(_)));
  }

  #[tokio::test]
  #[traced_test]
  async fn logs_state_transitions_and_phases() {
    let f = fixture();
    let mut registry = BuildSystemRegistry::with_builtins();
    registry.register(traced_system());
    let spec = sample_package("hello", "traced");

    realize(&spec, &registry, &InputTable::new(), &f.dirs, &ExecuteConfig::default())
      .await
      .unwrap();

    assert!(logs_contain("starting phase"));
    assert!(logs_contain("to=succeeded"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn copy_build_installs_and_wraps() {
    use crate::util::testutil::write_script;
    use crate::wrap::{EnvEdit, WrapMode};

    let temp = TempDir::new().unwrap();
    let dirs = BuildDirs::new(temp.path().join("source"), temp.path().join("out"));
    write_script(&dirs.source.join("tool-1.0/bin/tool"), "echo \"$TOOL_DATA\"");
    write_file(&dirs.source.join("tool-1.0/share/tool/data.txt"), "data");
    let data = temp.path().join("data-pkg");
    std::fs::create_dir_all(&data).unwrap();

    let spec = sample_package("tool", "copy")
      .with_input(InputRole::Propagated, DependencyRef::new("tool-data"))
      .with_edit(PhaseEdit::insert_after(
        "install",
        "wrap",
        Action::wrap(
          "$${out}/bin/tool",
          vec![EnvEdit::new("TOOL_DATA", WrapMode::Set, ["$${input:tool-data}"])],
        ),
      ));
    let table = InputTable::new().with_input(InputRole::Propagated, "tool-data", data.clone());

    let result = realize(
      &spec,
      &BuildSystemRegistry::with_builtins(),
      &table,
      &dirs,
      &ExecuteConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.work_dir, dirs.source.join("tool-1.0"));
    assert!(dirs.out.join("share/tool/data.txt").is_file());
    assert!(!dirs.out.join("tmp").exists());
    let output = std::process::Command::new(dirs.out.join("bin/tool")).output().unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), data.to_string_lossy());
  }
}
