//! Recipes loaded from JSON and built with a shell-only build system.

use phasekit_lib::action::Action;
use phasekit_lib::build_system::{BuildSystem, BuildSystemRegistry};
use phasekit_lib::execute::{BuildDirs, BuildError, ExecuteConfig, realize};
use phasekit_lib::inputs::InputTable;
use phasekit_lib::package::Catalog;
use phasekit_lib::phase::PhaseList;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "packages": [
    {
      "name": "banner",
      "version": "1.0",
      "source": { "method": "url", "location": "https://example.org/banner-{version}.tar.gz",
                  "sha256": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" },
      "build_system": "script",
      "phases": [
        { "op": "insert_before", "key": "build", "new_key": "set-version",
          "action": { "kind": "substitute", "files": ["banner.in"],
                      "rules": [{ "pattern": "@VERSION@", "replacement": "1.0" }] } },
        { "op": "replace", "key": "build",
          "action": { "kind": "shell", "script": "while read -r line; do echo \"$line\"; done < banner.in > banner.txt" } }
      ]
    }
  ]
}"#;

/// `unpack, build, install`, where install copies `banner.txt` into `share/`.
fn script_system() -> BuildSystem {
  BuildSystem::new("script", |_, _| {
    PhaseList::from_phases([
      ("unpack", Action::Unpack),
      ("build", Action::shell("exit 1")),
      (
        "install",
        Action::Install {
          plan: vec![phasekit_lib::action::actions::install::InstallEntry::new("banner.txt", "share/")],
        },
      ),
    ])
  })
}

fn registry() -> BuildSystemRegistry {
  let mut registry = BuildSystemRegistry::with_builtins();
  registry.register(script_system());
  registry
}

fn source_tree(banner: &str) -> (TempDir, BuildDirs) {
  let temp = TempDir::new().unwrap();
  let dirs = BuildDirs::new(temp.path().join("src"), temp.path().join("out"));
  let root = dirs.source.join("banner-1.0");
  std::fs::create_dir_all(&root).unwrap();
  std::fs::write(root.join("banner.in"), banner).unwrap();
  (temp, dirs)
}

#[cfg(unix)]
#[tokio::test]
async fn recipe_builds_with_customized_phases() {
  let catalog = Catalog::from_json_str(CATALOG).unwrap();
  let spec = catalog.find("banner", None).unwrap();
  let (_temp, dirs) = source_tree("banner version @VERSION@\n");

  let result = realize(spec, &registry(), &InputTable::new(), &dirs, &ExecuteConfig::default())
    .await
    .unwrap();

  let phases: Vec<&str> = result.phases.iter().map(|k| k.as_str()).collect();
  assert_eq!(phases, vec!["unpack", "set-version", "build", "install"]);
  assert_eq!(
    std::fs::read_to_string(dirs.out.join("share/banner.txt")).unwrap(),
    "banner version 1.0\n"
  );
}

#[cfg(unix)]
#[tokio::test]
async fn failing_substitution_names_the_phase() {
  let catalog = Catalog::from_json_str(CATALOG).unwrap();
  let spec = catalog.find("banner", Some("1.0")).unwrap();
  let (_temp, dirs) = source_tree("banner without a version\n");

  let err = realize(spec, &registry(), &InputTable::new(), &dirs, &ExecuteConfig::default())
    .await
    .unwrap_err();

  assert!(matches!(err, BuildError::SubstitutionNotFound { .. }));
  assert_eq!(err.phase().map(|k| k.as_str()), Some("set-version"));
  assert!(!dirs.out.join("share").exists());
}

#[test]
fn unregistered_build_system_is_rejected_by_validation() {
  let catalog = Catalog::from_json_str(CATALOG).unwrap();

  let err = catalog.validate(&BuildSystemRegistry::with_builtins()).unwrap_err();

  assert!(err.to_string().contains("unknown build system 'script'"));
  assert!(catalog.validate(&registry()).is_ok());
}
