//! Recording packages as declarative specs.

use fnpkg_lib::archive::Archive;
use fnpkg_lib::package::{CreateRequest, create_package_spec};
use fnpkg_lib::spec::{SpecDir, SpecDocument};
use fnpkg_lib::types::BuildStatus;

use super::common::{NS, TestEnv, env};

fn recorded_packages(dir: &SpecDir) -> Vec<fnpkg_lib::types::Package> {
  dir
    .load_all()
    .unwrap()
    .into_iter()
    .filter_map(|doc| match doc {
      SpecDocument::Package(pkg) => Some(pkg),
      _ => None,
    })
    .collect()
}

#[test]
fn source_package_is_recorded_pending() {
  let test_env = TestEnv::new();
  let src = test_env.write_file("fn.py", b"x = 1");
  let specs = SpecDir::new(test_env.temp.path().join("specs"));

  let meta = create_package_spec(
    &CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      source: vec![src],
      build_command: Some("./build.sh".to_string()),
      ..Default::default()
    },
    &specs,
  )
  .unwrap();

  let packages = recorded_packages(&specs);
  assert_eq!(packages.len(), 1);
  let pkg = &packages[0];
  assert_eq!(pkg.metadata.name, meta.name);
  assert_eq!(pkg.status.build_status, BuildStatus::Pending);
  assert_eq!(pkg.spec.build_command.as_deref(), Some("./build.sh"));
  match pkg.spec.source.as_ref().unwrap() {
    Archive::Url { url, checksum } => {
      assert!(url.starts_with("archive://fn-py-"), "{url}");
      assert!(checksum.is_none());
    }
    other => panic!("expected archive reference, got {other:?}"),
  }
}

#[test]
fn deployment_only_spec_starts_at_none() {
  let test_env = TestEnv::new();
  let deploy = test_env.write_file("fn.zip", b"prebuilt");
  let specs = SpecDir::new(test_env.temp.path().join("specs"));

  create_package_spec(
    &CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      deployment: vec![deploy],
      ..Default::default()
    },
    &specs,
  )
  .unwrap();

  let packages = recorded_packages(&specs);
  assert_eq!(packages[0].status.build_status, BuildStatus::None);
}

#[test]
fn identical_request_reuses_recorded_names() {
  let test_env = TestEnv::new();
  let src = test_env.write_file("fn.py", b"x = 1");
  let specs = SpecDir::new(test_env.temp.path().join("specs"));
  let req = CreateRequest {
    namespace: NS.to_string(),
    environment: env("python"),
    source: vec![src],
    ..Default::default()
  };

  let first = create_package_spec(&req, &specs).unwrap();
  let second = create_package_spec(&req, &specs).unwrap();

  assert_eq!(first.name, second.name);
  assert_eq!(specs.load_all().unwrap().len(), 2);
}

#[test]
fn spec_mode_still_checks_inputs() {
  let test_env = TestEnv::new();
  let specs = SpecDir::new(test_env.temp.path().join("specs"));
  let missing = test_env.temp.path().join("missing.py").display().to_string();

  let result = create_package_spec(
    &CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      source: vec![missing],
      ..Default::default()
    },
    &specs,
  );

  assert!(result.is_err());
  assert!(specs.load_all().unwrap().is_empty());
}
