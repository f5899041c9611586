//! Build systems.
//!
//! A [`BuildSystem`] is a name plus a constructor for its default
//! [`PhaseList`]. Build systems are stateless and shared by every package
//! that uses them; each call to [`BuildSystem::default_phases`] returns a
//! fresh list, so one package's customizations can never leak into another
//! package's build.
//!
//! # Built-ins
//!
//! - `gnu` - `unpack, configure, build, check, install` for autotools projects
//! - `copy` - `unpack, install`, copying files according to the install plan
//! - `trivial` - a single `build` phase that does nothing, meant to be replaced

mod copy;
mod gnu;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::action::Action;
use crate::execute::ExecuteConfig;
use crate::package::BuildArguments;
use crate::phase::{PhaseList, PhaseListError};

type PhaseConstructor = dyn Fn(&BuildArguments, &ExecuteConfig) -> Result<PhaseList, PhaseListError> + Send + Sync;

/// A named template for a default pipeline.
#[derive(Clone)]
pub struct BuildSystem {
  name: String,
  constructor: Arc<PhaseConstructor>,
}

impl BuildSystem {
  pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
  where
    F: Fn(&BuildArguments, &ExecuteConfig) -> Result<PhaseList, PhaseListError> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      constructor: Arc::new(constructor),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Build a new default pipeline for one package.
  ///
  /// Fails only if the constructor produces duplicate keys.
  pub fn default_phases(&self, arguments: &BuildArguments, config: &ExecuteConfig) -> Result<PhaseList, PhaseListError> {
    let phases = (self.constructor)(arguments, config)?;
    debug!(build_system = %self.name, phases = phases.len(), "default phases constructed");
    Ok(phases)
  }

  /// `gnu`: configure, make, make check, make install.
  pub fn gnu() -> Self {
    Self::new("gnu", gnu::default_phases)
  }

  /// `copy`: install files from the source tree without building.
  pub fn copy() -> Self {
    Self::new("copy", copy::default_phases)
  }

  /// `trivial`: one `build` phase doing nothing.
  pub fn trivial() -> Self {
    Self::new("trivial", |_, _| PhaseList::from_phases([("build", Action::Noop)]))
  }
}

impl fmt::Debug for BuildSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildSystem").field("name", &self.name).finish_non_exhaustive()
  }
}

/// Build systems by name.
#[derive(Debug, Clone, Default)]
pub struct BuildSystemRegistry {
  systems: BTreeMap<String, BuildSystem>,
}

impl BuildSystemRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding `gnu`, `copy` and `trivial`.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register(BuildSystem::gnu());
    registry.register(BuildSystem::copy());
    registry.register(BuildSystem::trivial());
    registry
  }

  /// Add a build system, replacing any previous one with the same name.
  pub fn register(&mut self, system: BuildSystem) {
    self.systems.insert(system.name.clone(), system);
  }

  pub fn get(&self, name: &str) -> Option<&BuildSystem> {
    self.systems.get(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.systems.keys().map(String::as_str)
  }
}
