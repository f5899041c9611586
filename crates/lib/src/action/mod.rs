//! Phase actions and their execution.
//!
//! Actions are the units of work phases perform: running commands,
//! patching files, wrapping programs, installing results, or calling a
//! native function.
//!
//! # Action Types
//!
//! - [`Action::Unpack`] - Enter the unpacked source tree
//! - [`Action::Exec`] / [`Action::Shell`] - Run a command in an isolated environment
//! - [`Action::Substitute`] - Strict in-place text substitution
//! - [`Action::Wrap`] - Install an environment-adjusting launcher
//! - [`Action::Install`] - Copy files into the output root
//! - [`Action::Native`] - A Rust function taking the phase context
//!
//! See [`crate::placeholder`] for the placeholders data actions may use.

pub mod actions;
mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::consts::DEFAULT_WRAPPER_SHELL;
use crate::execute::PhaseCtx;
use crate::placeholder::{self, PlaceholderError, Resolver};
use crate::substitute::{self, SubstitutionRule};
use crate::wrap::{self, EnvEdit, WrapOptions};
use actions::exec::{execute_cmd, execute_shell};
use actions::install::{InstallEntry, install_plan};

/// Execute a single phase action.
///
/// Placeholders in data actions are resolved against `ctx` first, so a
/// reference to an undeclared input fails before anything runs.
pub async fn execute_action(action: &Action, ctx: &mut PhaseCtx<'_>) -> Result<(), ActionError> {
  match action {
    Action::Unpack => unpack(ctx),
    Action::Noop => Ok(()),
    Action::Native(f) => {
      debug!(name = f.name(), "calling native action");
      f.call(ctx)
    }
    data => execute_data_action(data, ctx).await,
  }
}

/// Run an action that only reads the context.
async fn execute_data_action(action: &Action, ctx: &PhaseCtx<'_>) -> Result<(), ActionError> {
  match action {
    Action::Exec(opts) => {
      let bin = placeholder::substitute(&opts.bin, ctx)?;
      let args = match &opts.args {
        Some(args) => placeholder::substitute_all(args, ctx)?,
        None => Vec::new(),
      };
      let env = resolve_env(opts.env.as_ref(), ctx)?;
      let cwd = resolve_cwd(opts.cwd.as_deref(), ctx)?;

      execute_cmd(&bin, &args, env.as_ref(), cwd.as_deref(), ctx).await?;
    }

    Action::Shell { script, env, cwd } => {
      let script = placeholder::substitute(script, ctx)?;
      let env = resolve_env(env.as_ref(), ctx)?;
      let cwd = resolve_cwd(cwd.as_deref(), ctx)?;

      execute_shell(&script, env.as_ref(), cwd.as_deref(), ctx).await?;
    }

    Action::Substitute { files, rules } => {
      let files: Vec<PathBuf> = placeholder::substitute_all(files, ctx)?
        .into_iter()
        .map(|f| ctx.resolve_path(f))
        .collect();
      let rules = rules
        .iter()
        .map(|rule| {
          Ok(SubstitutionRule {
            pattern: placeholder::substitute(&rule.pattern, &Escaped::new(ctx, escape_pattern))?,
            replacement: placeholder::substitute(&rule.replacement, &Escaped::new(ctx, escape_replacement))?,
          })
        })
        .collect::<Result<Vec<_>, ActionError>>()?;

      let count = substitute::substitute_files(&files, &rules)?;
      debug!(files = files.len(), replacements = count, "substitution applied");
    }

    Action::Wrap { program, edits } => {
      let program = ctx.resolve_path(placeholder::substitute(program, ctx)?);
      let edits = edits
        .iter()
        .map(|edit| {
          Ok(EnvEdit {
            values: placeholder::substitute_all(&edit.values, ctx)?,
            ..edit.clone()
          })
        })
        .collect::<Result<Vec<_>, ActionError>>()?;

      let options = WrapOptions {
        interpreter: ctx
          .inputs
          .search_file("bin/sh")
          .unwrap_or_else(|| PathBuf::from(DEFAULT_WRAPPER_SHELL)),
      };
      wrap::wrap_program(&program, &edits, &options)?;
    }

    Action::Install { plan } => {
      let plan = plan
        .iter()
        .map(|entry| {
          Ok(InstallEntry {
            from: placeholder::substitute(&entry.from, ctx)?,
            to: placeholder::substitute(&entry.to, ctx)?,
          })
        })
        .collect::<Result<Vec<_>, ActionError>>()?;

      let copied = install_plan(&plan, &ctx.work_dir, ctx.out_dir)?;
      debug!(copied, "install plan complete");
    }

    // These need the mutable context and are handled by execute_action.
    Action::Unpack | Action::Noop | Action::Native(_) => {}
  }

  Ok(())
}

/// Resolves placeholders through `inner`, escaping every resolved value.
///
/// Paths spliced into a substitution rule must match and be inserted
/// literally.
struct Escaped<'r, R> {
  inner: &'r R,
  escape: fn(&str) -> String,
}

impl<'r, R: Resolver> Escaped<'r, R> {
  fn new(inner: &'r R, escape: fn(&str) -> String) -> Self {
    Self { inner, escape }
  }
}

impl<R: Resolver> Resolver for Escaped<'_, R> {
  fn resolve_out(&self) -> Result<String, PlaceholderError> {
    self.inner.resolve_out().map(|v| (self.escape)(&v))
  }

  fn resolve_source(&self) -> Result<String, PlaceholderError> {
    self.inner.resolve_source().map(|v| (self.escape)(&v))
  }

  fn resolve_input(&self, name: &str, output: Option<&str>) -> Result<String, PlaceholderError> {
    self.inner.resolve_input(name, output).map(|v| (self.escape)(&v))
  }
}

fn escape_pattern(value: &str) -> String {
  regex::escape(value)
}

fn escape_replacement(value: &str) -> String {
  value.replace('$', "$$")
}

/// Descend into the single top-level directory of the source tree, if any.
fn unpack(ctx: &mut PhaseCtx<'_>) -> Result<(), ActionError> {
  if !ctx.work_dir.is_dir() {
    return Err(ActionError::SourceMissing(ctx.work_dir.clone()));
  }

  let mut entries = std::fs::read_dir(&ctx.work_dir)?.collect::<Result<Vec<_>, _>>()?;
  if entries.len() == 1 && entries[0].file_type()?.is_dir() {
    let dir = entries.remove(0).path();
    info!(dir = ?dir, "entering source directory");
    ctx.work_dir = dir;
  }

  Ok(())
}

fn resolve_env(
  env: Option<&BTreeMap<String, String>>,
  ctx: &PhaseCtx<'_>,
) -> Result<Option<BTreeMap<String, String>>, ActionError> {
  let Some(env) = env else {
    return Ok(None);
  };

  let mut resolved = BTreeMap::new();
  for (key, value) in env {
    resolved.insert(key.clone(), placeholder::substitute(value, ctx)?);
  }
  Ok(Some(resolved))
}

fn resolve_cwd(cwd: Option<&str>, ctx: &PhaseCtx<'_>) -> Result<Option<PathBuf>, ActionError> {
  cwd
    .map(|cwd| Ok(ctx.resolve_path(placeholder::substitute(cwd, ctx)?)))
    .transpose()
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::inputs::InputRole;
  use crate::substitute::SubstituteError;
  use crate::util::testutil::{TestCtx, write_file, write_script};
  use crate::wrap::WrapMode;
  use tempfile::TempDir;

  #[tokio::test]
  async fn unpack_enters_single_directory() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    std::fs::create_dir_all(source.join("hello-2.12")).unwrap();
    let owned = TestCtx::new(&source, &temp.path().join("out"));
    let mut ctx = owned.ctx();

    execute_action(&Action::Unpack, &mut ctx).await.unwrap();

    assert_eq!(ctx.work_dir, source.join("hello-2.12"));
  }

  #[tokio::test]
  async fn unpack_keeps_multi_entry_tree() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("configure"), "");
    write_file(&temp.path().join("Makefile.in"), "");
    let owned = TestCtx::new(temp.path(), temp.path());
    let mut ctx = owned.ctx();

    execute_action(&Action::Unpack, &mut ctx).await.unwrap();

    assert_eq!(ctx.work_dir, temp.path());
  }

  #[tokio::test]
  async fn unpack_fails_without_source() {
    let temp = TempDir::new().unwrap();
    let owned = TestCtx::new(&temp.path().join("missing"), temp.path());
    let mut ctx = owned.ctx();

    let err = execute_action(&Action::Unpack, &mut ctx).await.unwrap_err();

    assert!(matches!(err, ActionError::SourceMissing(_)));
  }

  #[tokio::test]
  async fn substitute_resolves_input_placeholders() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("Makefile"), "PERL = /usr/bin/perl\n");
    let owned = TestCtx::new(temp.path(), temp.path()).with_input(InputRole::Native, "perl", "/store/perl-5.36");
    let mut ctx = owned.ctx();

    let action = Action::substitute(
      ["Makefile"],
      vec![SubstitutionRule::new("/usr/bin/perl", "$${input:perl}/bin/perl")],
    );
    execute_action(&action, &mut ctx).await.unwrap();

    assert_eq!(
      std::fs::read_to_string(temp.path().join("Makefile")).unwrap(),
      "PERL = /store/perl-5.36/bin/perl\n"
    );
  }

  #[tokio::test]
  async fn substitute_inserts_resolved_paths_literally() {
    let temp = TempDir::new().unwrap();
    write_file(
      &temp.path().join("Makefile"),
      "A = /opt/perl-5x36/bin/perl\nB = /opt/perl-5.36/bin/perl\n",
    );
    let owned = TestCtx::new(temp.path(), temp.path())
      .with_input(InputRole::Native, "old-perl", "/opt/perl-5.36")
      .with_input(InputRole::Native, "perl", "/store/$1-perl");
    let mut ctx = owned.ctx();

    let action = Action::substitute(
      ["Makefile"],
      vec![SubstitutionRule::new("$${input:old-perl}", "$${input:perl}")],
    );
    execute_action(&action, &mut ctx).await.unwrap();

    assert_eq!(
      std::fs::read_to_string(temp.path().join("Makefile")).unwrap(),
      "A = /opt/perl-5x36/bin/perl\nB = /store/$1-perl/bin/perl\n"
    );
  }

  #[tokio::test]
  async fn substitute_missing_pattern_fails() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("Makefile"), "all:\n");
    let owned = TestCtx::new(temp.path(), temp.path());
    let mut ctx = owned.ctx();

    let action = Action::substitute(["Makefile"], vec![SubstitutionRule::new("/bin/pwd", "pwd")]);
    let err = execute_action(&action, &mut ctx).await.unwrap_err();

    assert!(matches!(err, ActionError::Substitute(SubstituteError::NotFound { .. })));
  }

  #[tokio::test]
  async fn placeholder_for_undeclared_input_fails() {
    let temp = TempDir::new().unwrap();
    let owned = TestCtx::new(temp.path(), temp.path());
    let mut ctx = owned.ctx();

    let err = execute_action(&Action::shell("echo $${input:zlib}"), &mut ctx).await.unwrap_err();

    assert!(matches!(err, ActionError::Placeholder(_)));
  }

  #[tokio::test]
  async fn wrap_action_writes_launcher() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    write_script(&out.join("bin/tool"), "echo \"$TOOL_PATH\"");
    let owned = TestCtx::new(temp.path(), &out);
    let mut ctx = owned.ctx();

    let action = Action::wrap(
      "$${out}/bin/tool",
      vec![EnvEdit::new("TOOL_PATH", WrapMode::Set, ["$${out}/share"])],
    );
    execute_action(&action, &mut ctx).await.unwrap();

    let output = std::process::Command::new(out.join("bin/tool")).output().unwrap();
    assert_eq!(
      String::from_utf8_lossy(&output.stdout).trim(),
      out.join("share").to_string_lossy()
    );
  }

  #[tokio::test]
  async fn install_action_copies_into_out() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("src");
    let out = temp.path().join("out");
    write_file(&work.join("README"), "docs");
    let owned = TestCtx::new(&work, &out);
    let mut ctx = owned.ctx();

    let action = Action::Install {
      plan: vec![InstallEntry::new("README", "share/doc/")],
    };
    execute_action(&action, &mut ctx).await.unwrap();

    assert!(out.join("share/doc/README").is_file());
  }

  #[tokio::test]
  async fn native_action_receives_context() {
    let temp = TempDir::new().unwrap();
    let owned = TestCtx::new(temp.path(), temp.path());
    let mut ctx = owned.ctx();

    let action = Action::native("write-version", |ctx| {
      std::fs::write(ctx.out_dir.join("VERSION"), &ctx.package.version)?;
      Ok(())
    });
    execute_action(&action, &mut ctx).await.unwrap();

    assert_eq!(std::fs::read_to_string(temp.path().join("VERSION")).unwrap(), "1.0");
  }
}
