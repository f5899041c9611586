//! Tests for `phasekit build`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

const GREET_SCRIPT: &str = "#!/bin/sh\necho \"$GREETING from @COREUTILS@\"\n";

#[cfg(unix)]
fn greeting_source(env: &TestEnv, script: &str) {
  env.write_script("source/greeting-1.0/greet.sh", script);
  env.write_file("source/greeting-1.0/README", "Greeting\n");
}

#[cfg(unix)]
#[test]
fn builds_patches_installs_and_wraps() {
  let env = TestEnv::new();
  greeting_source(&env, GREET_SCRIPT);
  let coreutils = env.path("inputs/coreutils");
  std::fs::create_dir_all(&coreutils).unwrap();
  let inputs = env.write_inputs(&coreutils);
  let out = env.path("out");

  env
    .build_cmd("greeting")
    .arg("--inputs")
    .arg(&inputs)
    .arg("--out")
    .arg(&out)
    .assert()
    .success()
    .stdout(predicate::str::contains("Built greeting@1.0"))
    .stdout(predicate::str::contains("unpack, patch-paths, install, wrap"));

  assert!(out.join("share/doc/greeting/README").is_file());
  assert!(!out.join("tmp").exists());

  let output = std::process::Command::new(out.join("bin/greet")).output().unwrap();
  assert_eq!(
    String::from_utf8_lossy(&output.stdout).trim(),
    format!("hello from {}", coreutils.display())
  );
}

#[cfg(unix)]
#[test]
fn default_output_lives_in_store() {
  let env = TestEnv::new();
  greeting_source(&env, GREET_SCRIPT);
  let coreutils = env.path("inputs/coreutils");
  std::fs::create_dir_all(&coreutils).unwrap();
  let inputs = env.write_inputs(&coreutils);

  env.build_cmd("greeting").arg("--inputs").arg(&inputs).assert().success();

  let entries: Vec<String> = std::fs::read_dir(env.store_dir())
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(entries.len(), 1);
  let (hash, rest) = entries[0].split_once('-').unwrap();
  assert_eq!(hash.len(), 20);
  assert_eq!(rest, "greeting-1.0");
}

#[cfg(unix)]
#[test]
fn relative_source_with_default_store() {
  let env = TestEnv::new();
  greeting_source(&env, GREET_SCRIPT);
  let coreutils = env.path("inputs/coreutils");
  std::fs::create_dir_all(&coreutils).unwrap();
  let inputs = env.write_inputs(&coreutils);

  let mut cmd: Command = cargo_bin_cmd!("phasekit");
  cmd
    .current_dir(env.temp.path())
    .arg("build")
    .arg(fixture_path("catalog.json"))
    .arg("greeting")
    .args(["--source", "source", "--inputs"])
    .arg(&inputs)
    .env_remove("PHASEKIT_STORE")
    .env_remove("RUST_LOG")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built greeting@1.0"));

  let store = env.path("phasekit-store");
  let entry = std::fs::read_dir(&store).unwrap().next().unwrap().unwrap().path();
  assert!(entry.join("share/doc/greeting/README").is_file());
  assert!(!env.path("source/greeting-1.0/phasekit-store").exists());

  let output = std::process::Command::new(entry.join("bin/greet"))
    .current_dir("/")
    .output()
    .unwrap();
  assert_eq!(
    String::from_utf8_lossy(&output.stdout).trim(),
    format!("hello from {}", coreutils.display())
  );
}

#[cfg(unix)]
#[test]
fn missing_pattern_fails_at_patch_phase() {
  let env = TestEnv::new();
  greeting_source(&env, "#!/bin/sh\necho \"$GREETING\"\n");
  let coreutils = env.path("inputs/coreutils");
  std::fs::create_dir_all(&coreutils).unwrap();
  let inputs = env.write_inputs(&coreutils);
  let out = env.path("out");

  env
    .build_cmd("greeting")
    .arg("--inputs")
    .arg(&inputs)
    .arg("--out")
    .arg(&out)
    .assert()
    .failure()
    .stderr(predicate::str::contains("greeting@1.0 failed in phase 'patch-paths'"))
    .stderr(predicate::str::contains("substitution pattern not found: '@COREUTILS@'"));

  assert!(!out.join("bin/greet").exists());
}

#[cfg(unix)]
#[test]
fn missing_input_fails_before_any_phase() {
  let env = TestEnv::new();
  greeting_source(&env, GREET_SCRIPT);
  let out = env.path("out");

  env
    .build_cmd("greeting")
    .arg("--out")
    .arg(&out)
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed before any phase ran"))
    .stderr(predicate::str::contains("unresolved input 'coreutils'"));

  assert!(!out.exists());
}

#[test]
fn unknown_version_fails() {
  let env = TestEnv::new();

  env
    .build_cmd("greeting")
    .args(["--version", "7.0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("version 7.0 not found"));
}
