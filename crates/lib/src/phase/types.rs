use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;

/// Name of a phase, unique within a [`PhaseList`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseKey(pub String);

impl PhaseKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for PhaseKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for PhaseKey {
  fn from(key: &str) -> Self {
    Self(key.to_string())
  }
}

impl From<String> for PhaseKey {
  fn from(key: String) -> Self {
    Self(key)
  }
}

/// One named unit of build work.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
  pub key: PhaseKey,
  pub action: Action,
}

/// Errors raised by [`PhaseList`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseListError {
  /// The referenced phase does not exist in the list.
  #[error("no phase named '{0}'")]
  UnknownPhase(PhaseKey),

  /// A phase with this key is already present.
  #[error("phase '{0}' already exists")]
  DuplicatePhase(PhaseKey),
}

/// An ordered sequence of phases with unique keys.
///
/// Every mutating operation validates its preconditions before touching the
/// list, so a failed operation leaves the list exactly as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseList {
  phases: Vec<Phase>,
}

impl PhaseList {
  /// Create an empty phase list.
  pub fn new() -> Self {
    Self { phases: Vec::new() }
  }

  /// Build a list from `(key, action)` pairs, rejecting duplicate keys.
  pub fn from_phases<I, K>(phases: I) -> Result<Self, PhaseListError>
  where
    I: IntoIterator<Item = (K, Action)>,
    K: Into<PhaseKey>,
  {
    let mut list = Self::new();
    for (key, action) in phases {
      list.push(key, action)?;
    }
    Ok(list)
  }

  /// Append a phase at the end of the list.
  pub fn push(&mut self, key: impl Into<PhaseKey>, action: Action) -> Result<(), PhaseListError> {
    let key = key.into();
    self.ensure_absent(&key)?;
    self.phases.push(Phase { key, action });
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.phases.len()
  }

  pub fn is_empty(&self) -> bool {
    self.phases.is_empty()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.phases.iter().any(|p| p.key.as_str() == key)
  }

  /// Returns the action registered under `key`.
  pub fn get(&self, key: &str) -> Option<&Action> {
    self.phases.iter().find(|p| p.key.as_str() == key).map(|p| &p.action)
  }

  /// Phase keys in execution order.
  pub fn keys(&self) -> impl Iterator<Item = &PhaseKey> {
    self.phases.iter().map(|p| &p.key)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Phase> {
    self.phases.iter()
  }

  /// Swap the action of an existing phase, keeping its position.
  pub fn replace(&mut self, key: &str, action: Action) -> Result<(), PhaseListError> {
    let index = self.position(key)?;
    self.phases[index].action = action;
    Ok(())
  }

  /// Insert a new phase immediately before `key`.
  pub fn insert_before(
    &mut self,
    key: &str,
    new_key: impl Into<PhaseKey>,
    action: Action,
  ) -> Result<(), PhaseListError> {
    let index = self.position(key)?;
    self.insert_at(index, new_key.into(), action)
  }

  /// Insert a new phase immediately after `key`.
  pub fn insert_after(&mut self, key: &str, new_key: impl Into<PhaseKey>, action: Action) -> Result<(), PhaseListError> {
    let index = self.position(key)?;
    self.insert_at(index + 1, new_key.into(), action)
  }

  /// Remove a phase, returning its action.
  pub fn delete(&mut self, key: &str) -> Result<Action, PhaseListError> {
    let index = self.position(key)?;
    Ok(self.phases.remove(index).action)
  }

  fn insert_at(&mut self, index: usize, key: PhaseKey, action: Action) -> Result<(), PhaseListError> {
    self.ensure_absent(&key)?;
    self.phases.insert(index, Phase { key, action });
    Ok(())
  }

  fn position(&self, key: &str) -> Result<usize, PhaseListError> {
    self
      .phases
      .iter()
      .position(|p| p.key.as_str() == key)
      .ok_or_else(|| PhaseListError::UnknownPhase(PhaseKey::from(key)))
  }

  fn ensure_absent(&self, key: &PhaseKey) -> Result<(), PhaseListError> {
    if self.contains(key.as_str()) {
      return Err(PhaseListError::DuplicatePhase(key.clone()));
    }
    Ok(())
  }
}

impl<'a> IntoIterator for &'a PhaseList {
  type Item = &'a Phase;
  type IntoIter = std::slice::Iter<'a, Phase>;

  fn into_iter(self) -> Self::IntoIter {
    self.phases.iter()
  }
}
