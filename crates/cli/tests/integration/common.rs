//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated build environment.
///
/// Each test gets its own source tree, input table, store and output paths.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write an executable script relative to the temp directory.
  #[cfg(unix)]
  pub fn write_script(&self, relative_path: &str, content: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = self.write_file(relative_path, content);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  pub fn source_dir(&self) -> PathBuf {
    self.path("source")
  }

  pub fn store_dir(&self) -> PathBuf {
    self.path("store")
  }

  /// Write an input table supplying `coreutils` as a native input.
  pub fn write_inputs(&self, coreutils: &Path) -> PathBuf {
    let table = serde_json::json!({ "native": { "coreutils": coreutils } });
    self.write_file("inputs.json", &table.to_string())
  }

  /// `phasekit build <fixture catalog> <name>` with this environment's paths.
  pub fn build_cmd(&self, name: &str) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("phasekit");
    cmd
      .arg("build")
      .arg(fixture_path("catalog.json"))
      .arg(name)
      .arg("--source")
      .arg(self.source_dir())
      .arg("--store")
      .arg(self.store_dir())
      .env_remove("PHASEKIT_STORE")
      .env_remove("RUST_LOG");
    cmd
  }
}
