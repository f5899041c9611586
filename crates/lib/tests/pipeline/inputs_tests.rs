//! Input resolution through the public API.

use std::path::Path;

use phasekit_lib::inputs::{DependencyRef, InputDecls, InputResolver, InputRole, InputTable, ResolveError};

fn decls() -> InputDecls {
  let mut decls = InputDecls::new();
  decls.insert(
    InputRole::Required,
    vec![DependencyRef::new("zlib"), DependencyRef::new("openssl")],
  );
  decls
}

#[test]
fn resolves_supplied_input_and_rejects_missing_one() {
  let decls = decls();
  let table = InputTable::from_json_str(r#"{ "required": { "zlib": "/store/zlib-1.2" } }"#).unwrap();
  let resolver = InputResolver::new(&decls, &table);

  assert_eq!(
    resolver.resolve(Some(InputRole::Required), "zlib", None).unwrap(),
    Path::new("/store/zlib-1.2")
  );
  assert_eq!(
    resolver.resolve(Some(InputRole::Required), "openssl", None),
    Err(ResolveError::Unresolved {
      role: Some(InputRole::Required),
      name: "openssl".to_string(),
    })
  );
  assert!(resolver.resolve_all().is_err());
}

#[test]
fn resolution_is_deterministic_within_a_build() {
  let decls = decls();
  let table = InputTable::new()
    .with_input(InputRole::Required, "zlib", "/store/zlib-1.2")
    .with_input(InputRole::Required, "openssl", "/store/openssl-3.0");

  let resolved = InputResolver::new(&decls, &table).resolve_all().unwrap();

  let first = resolved.resolve(None, "openssl", None).unwrap().to_path_buf();
  let second = resolved.resolve(None, "openssl", None).unwrap().to_path_buf();
  assert_eq!(first, second);
  assert_eq!(resolved.len(), 2);
}

#[test]
fn multi_output_inputs_select_by_name() {
  let mut decls = InputDecls::new();
  decls.insert(InputRole::Native, vec!["gcc:lib".parse().unwrap()]);
  let table = InputTable::from_json_str(
    r#"{ "native": { "gcc": { "out": "/store/gcc-13", "lib": "/store/gcc-13-lib" } } }"#,
  )
  .unwrap();

  let resolved = InputResolver::new(&decls, &table).resolve_all().unwrap();

  assert_eq!(resolved.resolve(None, "gcc", None).unwrap(), Path::new("/store/gcc-13-lib"));
  assert_eq!(
    resolved.resolve(None, "gcc", Some("out")).unwrap(),
    Path::new("/store/gcc-13")
  );
  assert!(matches!(
    resolved.resolve(None, "gcc", Some("doc")),
    Err(ResolveError::UnknownOutput { .. })
  ));
}
