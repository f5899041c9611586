use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::types::{PhaseKey, PhaseList, PhaseListError};
use crate::action::Action;

/// One command of a package's customization script.
///
/// Recipes write these as JSON objects tagged by `op`:
///
/// ```json
/// { "op": "insert_after", "key": "build", "new_key": "patch-paths",
///   "action": { "kind": "noop" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PhaseEdit {
  /// Swap the action of `key`; its position is unchanged.
  Replace { key: PhaseKey, action: Action },
  /// Insert `new_key` immediately before `key`.
  InsertBefore {
    key: PhaseKey,
    new_key: PhaseKey,
    action: Action,
  },
  /// Insert `new_key` immediately after `key`.
  InsertAfter {
    key: PhaseKey,
    new_key: PhaseKey,
    action: Action,
  },
  /// Remove `key`.
  Delete { key: PhaseKey },
}

impl PhaseEdit {
  pub fn replace(key: impl Into<PhaseKey>, action: Action) -> Self {
    Self::Replace { key: key.into(), action }
  }

  pub fn insert_before(key: impl Into<PhaseKey>, new_key: impl Into<PhaseKey>, action: Action) -> Self {
    Self::InsertBefore {
      key: key.into(),
      new_key: new_key.into(),
      action,
    }
  }

  pub fn insert_after(key: impl Into<PhaseKey>, new_key: impl Into<PhaseKey>, action: Action) -> Self {
    Self::InsertAfter {
      key: key.into(),
      new_key: new_key.into(),
      action,
    }
  }

  pub fn delete(key: impl Into<PhaseKey>) -> Self {
    Self::Delete { key: key.into() }
  }

  /// The existing phase this edit refers to.
  pub fn target(&self) -> &PhaseKey {
    match self {
      Self::Replace { key, .. } | Self::InsertBefore { key, .. } | Self::InsertAfter { key, .. } | Self::Delete { key } => {
        key
      }
    }
  }

  pub fn op_name(&self) -> &'static str {
    match self {
      Self::Replace { .. } => "replace",
      Self::InsertBefore { .. } => "insert_before",
      Self::InsertAfter { .. } => "insert_after",
      Self::Delete { .. } => "delete",
    }
  }

  fn apply_to(&self, list: &mut PhaseList) -> Result<(), PhaseListError> {
    match self {
      Self::Replace { key, action } => list.replace(key.as_str(), action.clone()),
      Self::InsertBefore { key, new_key, action } => list.insert_before(key.as_str(), new_key.clone(), action.clone()),
      Self::InsertAfter { key, new_key, action } => list.insert_after(key.as_str(), new_key.clone(), action.clone()),
      Self::Delete { key } => list.delete(key.as_str()).map(|_| ()),
    }
  }
}

/// A customization script could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("edit #{index} ({op} '{target}'): {source}")]
pub struct CustomizationError {
  /// Position of the failing edit in the script.
  pub index: usize,
  pub op: &'static str,
  pub target: PhaseKey,
  #[source]
  pub source: PhaseListError,
}

/// Derive a package pipeline from a build system's default pipeline.
///
/// Edits apply in script order, each against the result of the previous one.
/// `base` is never modified: the edits run on a private copy, and any failing
/// edit discards that copy, so callers see either the complete pipeline or an
/// error.
pub fn customize(base: &PhaseList, edits: &[PhaseEdit]) -> Result<PhaseList, CustomizationError> {
  let mut list = base.clone();

  for (index, edit) in edits.iter().enumerate() {
    debug!(index, op = edit.op_name(), target = %edit.target(), "applying phase edit");
    edit.apply_to(&mut list).map_err(|source| CustomizationError {
      index,
      op: edit.op_name(),
      target: edit.target().clone(),
      source,
    })?;
  }

  Ok(list)
}
