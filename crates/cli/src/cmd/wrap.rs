//! Implementation of the `phasekit wrap` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use phasekit_lib::wrap::{EnvEdit, WrapMode, WrapOptions, wrap_program};

use crate::output::print_success;

fn parse_edit(raw: &str, mode: WrapMode) -> Result<EnvEdit> {
  let Some((var, value)) = raw.split_once('=') else {
    bail!("expected VAR=VALUE, got '{}'", raw);
  };
  Ok(EnvEdit::new(var, mode, [value]))
}

/// Wrap `program`, applying set, then prefix, then suffix edits.
pub fn cmd_wrap(program: &Path, prefix: &[String], suffix: &[String], set: &[String]) -> Result<()> {
  let mut edits = Vec::new();
  for (raws, mode) in [(set, WrapMode::Set), (prefix, WrapMode::Prefix), (suffix, WrapMode::Suffix)] {
    for raw in raws {
      edits.push(parse_edit(raw, mode)?);
    }
  }
  if edits.is_empty() {
    bail!("nothing to do: pass at least one of --prefix, --suffix or --set");
  }

  let real = wrap_program(program, &edits, &WrapOptions::default())
    .with_context(|| format!("Failed to wrap {}", program.display()))?;

  print_success(&format!("Wrapped {} ({} edit(s), real program at {})", program.display(), edits.len(), real.display()));
  Ok(())
}
