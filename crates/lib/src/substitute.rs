//! Strict in-place text substitution.
//!
//! Every rule must match at least once in every file it is applied to. A
//! rule that matches nothing means upstream moved the text being patched,
//! and the build must stop there rather than continue unpatched.
//!
//! Patterns are regular expressions ([`regex`] syntax) matched against raw
//! bytes, so files need not be valid UTF-8. Replacements may refer to
//! capture groups as `$1` or `${name}`; write `$$` for a literal `$`.
//!
//! Rules are applied in order, each one seeing the output of the previous
//! one. All files are rewritten in memory first and only written back once
//! every rule has matched in every file, so a failed call leaves the files
//! untouched.

use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One `pattern -> replacement` edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstitutionRule {
  pub pattern: String,
  pub replacement: String,
}

impl SubstitutionRule {
  pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
    Self {
      pattern: pattern.into(),
      replacement: replacement.into(),
    }
  }
}

/// Errors that can occur while substituting.
#[derive(Debug, Error)]
pub enum SubstituteError {
  #[error("substitution pattern not found: '{pattern}' in {}", .file.display())]
  NotFound { file: PathBuf, pattern: String },

  #[error("invalid substitution pattern '{pattern}': {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {}: {source}", .path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("substitution has no target files")]
  NoFiles,

  #[error("substitution has no rules")]
  NoRules,
}

struct CompiledRule<'a> {
  regex: Regex,
  rule: &'a SubstitutionRule,
}

fn compile(rules: &[SubstitutionRule]) -> Result<Vec<CompiledRule<'_>>, SubstituteError> {
  rules
    .iter()
    .map(|rule| {
      let regex = Regex::new(&rule.pattern).map_err(|source| SubstituteError::InvalidPattern {
        pattern: rule.pattern.clone(),
        source,
      })?;
      Ok(CompiledRule { regex, rule })
    })
    .collect()
}

/// Apply `rules` in order to an in-memory buffer.
///
/// `file` is only used for error reporting. Returns the new contents and the
/// total number of replacements made.
fn apply(file: &Path, content: Vec<u8>, rules: &[CompiledRule<'_>]) -> Result<(Vec<u8>, usize), SubstituteError> {
  let mut content = content;
  let mut total = 0;

  for compiled in rules {
    let count = compiled.regex.find_iter(&content).count();
    if count == 0 {
      return Err(SubstituteError::NotFound {
        file: file.to_path_buf(),
        pattern: compiled.rule.pattern.clone(),
      });
    }
    content = compiled
      .regex
      .replace_all(&content, compiled.rule.replacement.as_bytes())
      .into_owned();
    total += count;
  }

  Ok((content, total))
}

/// Substitute within a single string, with the same strictness as
/// [`substitute_files`].
pub fn substitute_str(input: &str, rules: &[SubstitutionRule]) -> Result<String, SubstituteError> {
  if rules.is_empty() {
    return Err(SubstituteError::NoRules);
  }
  let compiled = compile(rules)?;
  let (content, _) = apply(Path::new("<string>"), input.as_bytes().to_vec(), &compiled)?;
  Ok(String::from_utf8_lossy(&content).into_owned())
}

/// Apply `rules` to every file in `files`, in place.
///
/// Returns the total number of replacements across all files.
pub fn substitute_files(files: &[PathBuf], rules: &[SubstitutionRule]) -> Result<usize, SubstituteError> {
  if files.is_empty() {
    return Err(SubstituteError::NoFiles);
  }
  if rules.is_empty() {
    return Err(SubstituteError::NoRules);
  }

  let compiled = compile(rules)?;

  let mut rewritten = Vec::with_capacity(files.len());
  let mut total = 0;
  for file in files {
    let content = std::fs::read(file).map_err(|source| SubstituteError::Read {
      path: file.clone(),
      source,
    })?;
    let (content, count) = apply(file, content, &compiled)?;
    debug!(file = ?file, replacements = count, "substituted");
    total += count;
    rewritten.push((file, content));
  }

  for (file, content) in rewritten {
    std::fs::write(file, content).map_err(|source| SubstituteError::Write {
      path: file.clone(),
      source,
    })?;
  }

  Ok(total)
}
