//! Create, update and rebuild against the in-memory control plane.

use fnpkg_lib::archive::{Archive, ArchiveError, ArchiveKind};
use fnpkg_lib::control::ControlPlane;
use fnpkg_lib::package::{BuildDecision, CreateRequest, ErrorKind, PackageError, UpdateRequest};
use fnpkg_lib::types::BuildStatus;
use fnpkg_lib::util::hash::checksum_bytes;

use super::common::{NS, TestEnv, env};

fn source_request(inputs: Vec<String>) -> CreateRequest {
  CreateRequest {
    namespace: NS.to_string(),
    environment: env("python"),
    source: inputs,
    ..Default::default()
  }
}

fn deploy_request(inputs: Vec<String>) -> CreateRequest {
  CreateRequest {
    namespace: NS.to_string(),
    environment: env("python"),
    deployment: inputs,
    ..Default::default()
  }
}

#[tokio::test]
async fn source_package_walkthrough() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", &vec![b'#'; 2048]);

  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();
  assert!(meta.name.starts_with("fn-py-"), "{}", meta.name);

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.status.build_status, BuildStatus::Pending);
  assert_eq!(pkg.spec.source.as_ref().map(Archive::kind), Some(ArchiveKind::Literal));

  let err = env.manager.rebuild(NS, &meta.name).await.unwrap_err();
  assert!(matches!(err, PackageError::NotFailed { .. }));
  assert_eq!(err.kind(), ErrorKind::Conflict);

  env
    .plane()
    .set_build_status(NS, &meta.name, BuildStatus::Failed, "build failed");
  let outcome = env.manager.rebuild(NS, &meta.name).await.unwrap();
  assert_eq!(outcome.build, BuildDecision::Rebuild);

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.status.build_status, BuildStatus::Pending);
  assert!(pkg.status.build_log.is_empty());
}

#[tokio::test]
async fn literal_below_limit_url_at_or_above() {
  let env = TestEnv::with_literal_limit(64);
  let small = env.write_file("small.bin", b"tiny");
  let large = env.write_file("large.bin", &vec![b'x'; 64]);

  let small_meta = env
    .manager
    .create(&CreateRequest {
      skip_compression: true,
      ..deploy_request(vec![small])
    })
    .await
    .unwrap();
  let large_meta = env
    .manager
    .create(&CreateRequest {
      skip_compression: true,
      ..deploy_request(vec![large])
    })
    .await
    .unwrap();

  let small_pkg = env.plane().package(NS, &small_meta.name).unwrap();
  assert_eq!(small_pkg.spec.deployment, Some(Archive::literal(b"tiny".to_vec())));
  assert_eq!(small_pkg.status.build_status, BuildStatus::Succeeded);

  let large_pkg = env.plane().package(NS, &large_meta.name).unwrap();
  match large_pkg.spec.deployment.unwrap() {
    Archive::Url { url, checksum } => {
      assert!(url.starts_with("http://storage.test/v1/archive?id="), "{url}");
      assert_eq!(checksum, Some(checksum_bytes(&vec![b'x'; 64])));
    }
    other => panic!("expected url archive, got {other:?}"),
  }
}

#[tokio::test]
async fn single_url_is_not_uploaded() {
  let env = TestEnv::new();
  let url = "https://artifacts.example.com/fn.zip".to_string();

  let meta = env.manager.create(&deploy_request(vec![url.clone()])).await.unwrap();

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.spec.deployment, Some(Archive::url(url, None)));
  assert!(env.manager.transport().blob().is_empty());
}

#[tokio::test]
async fn missing_inputs_create_nothing() {
  let env = TestEnv::new();
  let missing = env.temp.path().join("nope/*.py").display().to_string();

  let err = env.manager.create(&source_request(vec![missing])).await.unwrap_err();
  assert!(matches!(err, PackageError::Archive(ArchiveError::NoFilesMatched { .. })));
  assert_eq!(err.kind(), ErrorKind::Input);
  assert!(env.plane().list_packages(NS).await.unwrap().is_empty());
}

#[tokio::test]
async fn deployment_only_update_does_not_owe_build() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", b"def main(): pass");
  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();

  let deploy = env.write_file("deploy/fn.zip", b"prebuilt");
  let req = UpdateRequest {
    deployment: vec![deploy],
    skip_compression: true,
    ..Default::default()
  };
  let outcome = env.manager.update(NS, &meta.name, &req).await.unwrap();

  assert_eq!(outcome.build, BuildDecision::Prebuilt);
  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_ne!(pkg.status.build_status, BuildStatus::Pending);
  assert_eq!(pkg.spec.deployment, Some(Archive::literal(b"prebuilt".to_vec())));
}

#[tokio::test]
async fn source_only_update_owes_build() {
  let env = TestEnv::new();
  let deploy = env.write_file("fn.zip", b"prebuilt");
  let meta = env
    .manager
    .create(&CreateRequest {
      skip_compression: true,
      ..deploy_request(vec![deploy])
    })
    .await
    .unwrap();
  assert_eq!(
    env.plane().package(NS, &meta.name).unwrap().status.build_status,
    BuildStatus::Succeeded
  );

  let src = env.write_file("src/fn.py", b"def main(): pass");
  let req = UpdateRequest {
    source: vec![src],
    ..Default::default()
  };
  env.manager.update(NS, &meta.name, &req).await.unwrap();

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.status.build_status, BuildStatus::Pending);
}

#[tokio::test]
async fn same_environment_is_not_a_change() {
  let env = TestEnv::new();
  let deploy = env.write_file("fn.zip", b"prebuilt");
  let meta = env
    .manager
    .create(&CreateRequest {
      skip_compression: true,
      ..deploy_request(vec![deploy])
    })
    .await
    .unwrap();

  let req = UpdateRequest {
    env_name: Some("python".to_string()),
    env_namespace: Some(NS.to_string()),
    ..Default::default()
  };
  let outcome = env.manager.update(NS, &meta.name, &req).await.unwrap();

  assert_eq!(outcome.build, BuildDecision::Unchanged);
  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.status.build_status, BuildStatus::Succeeded);

  let req = UpdateRequest {
    env_name: Some("python3".to_string()),
    ..Default::default()
  };
  let outcome = env.manager.update(NS, &meta.name, &req).await.unwrap();
  assert_eq!(outcome.build, BuildDecision::Rebuild);
  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.spec.environment.name, "python3");
  assert_eq!(pkg.status.build_status, BuildStatus::Pending);
}

#[tokio::test]
async fn rebuild_only_from_failed() {
  for status in [
    BuildStatus::None,
    BuildStatus::Pending,
    BuildStatus::Running,
    BuildStatus::Succeeded,
  ] {
    let env = TestEnv::new();
    let src = env.write_file("fn.py", b"x = 1");
    let meta = env.manager.create(&source_request(vec![src])).await.unwrap();
    env.plane().set_build_status(NS, &meta.name, status, "");
    let before = env.plane().package(NS, &meta.name).unwrap();

    let err = env.manager.rebuild(NS, &meta.name).await.unwrap_err();
    assert!(matches!(err, PackageError::NotFailed { status: s, .. } if s == status));
    assert_eq!(env.plane().package(NS, &meta.name).unwrap(), before);
  }
}

#[tokio::test]
async fn shared_package_needs_force() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", b"x = 1");
  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();
  env.add_function("hello", &meta.name);
  env.add_function("hello-too", &meta.name);
  let before = env.plane().package(NS, &meta.name).unwrap();

  let req = UpdateRequest {
    build_command: Some("./build.sh".to_string()),
    ..Default::default()
  };
  let err = env.manager.update(NS, &meta.name, &req).await.unwrap_err();
  assert!(matches!(err, PackageError::MultipleReferences { count: 2, .. }));
  assert_eq!(env.plane().package(NS, &meta.name).unwrap(), before);

  let forced = UpdateRequest { force: true, ..req };
  let outcome = env.manager.update(NS, &meta.name, &forced).await.unwrap();

  assert!(outcome.sync.is_complete());
  assert_eq!(outcome.sync.updated.len(), 2);
  assert_eq!(env.function_version("hello"), outcome.package.resource_version);
  assert_eq!(env.function_version("hello-too"), outcome.package.resource_version);
}

#[tokio::test]
async fn partial_fanout_keeps_package_update() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", b"x = 1");
  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();
  env.add_function("ok", &meta.name);
  env.add_function("broken", &meta.name);
  env.plane().fail_function_updates(NS, "broken");

  let req = UpdateRequest {
    build_command: Some("make".to_string()),
    force: true,
    ..Default::default()
  };
  let outcome = env.manager.update(NS, &meta.name, &req).await.unwrap();

  assert_eq!(outcome.sync.updated, vec!["ok"]);
  assert_eq!(outcome.sync.failed.len(), 1);
  assert_eq!(outcome.sync.failed[0].function, "broken");

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.spec.build_command.as_deref(), Some("make"));
  assert_eq!(pkg.metadata.resource_version, outcome.package.resource_version);
  assert_eq!(env.function_version("ok"), outcome.package.resource_version);
}

#[tokio::test]
async fn rebuild_advances_referencing_function() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", b"x = 1");
  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();
  env.add_function("hello", &meta.name);
  env.plane().set_build_status(NS, &meta.name, BuildStatus::Failed, "");

  let outcome = env.manager.rebuild(NS, &meta.name).await.unwrap();
  assert_eq!(env.function_version("hello"), outcome.package.resource_version);
}

#[tokio::test]
async fn stale_write_is_conflict() {
  let env = TestEnv::new();
  let src = env.write_file("fn.py", b"x = 1");
  let meta = env.manager.create(&source_request(vec![src])).await.unwrap();

  let stale = env.plane().package(NS, &meta.name).unwrap();
  env.plane().set_build_status(NS, &meta.name, BuildStatus::Running, "");

  let req = UpdateRequest {
    build_command: Some("make".to_string()),
    ..Default::default()
  };
  let err = env.manager.update_record(stale, &req).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let pkg = env.plane().package(NS, &meta.name).unwrap();
  assert_eq!(pkg.status.build_status, BuildStatus::Running);
  assert_eq!(pkg.spec.build_command, None);
}

#[tokio::test]
async fn update_of_missing_package_is_input_error() {
  let env = TestEnv::new();
  let req = UpdateRequest {
    build_command: Some("make".to_string()),
    ..Default::default()
  };
  let err = env.manager.update(NS, "ghost", &req).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Input);
  assert!(err.to_string().contains("ghost"));
}
