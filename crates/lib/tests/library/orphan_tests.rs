//! Deletion policy, orphan listing and orphan sweeps.

use fnpkg_lib::package::{ErrorKind, PackageError};
use fnpkg_lib::types::{ObjectMeta, Package, PackageSpec};

use super::common::{NS, TestEnv, env};

fn seed_package(test_env: &TestEnv, name: &str) {
  test_env.plane().insert_package(Package {
    metadata: ObjectMeta::new(NS, name),
    spec: PackageSpec {
      environment: env("python"),
      ..Default::default()
    },
    ..Default::default()
  });
}

#[tokio::test]
async fn referenced_package_needs_force_to_delete() {
  let env = TestEnv::new();
  seed_package(&env, "shared");
  env.add_function("hello", "shared");

  let err = env.manager.delete(NS, "shared", false).await.unwrap_err();
  assert!(matches!(err, PackageError::Referenced { count: 1, .. }));
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert!(env.plane().package(NS, "shared").is_some());

  env.manager.delete(NS, "shared", true).await.unwrap();
  assert!(env.plane().package(NS, "shared").is_none());
}

#[tokio::test]
async fn unreferenced_package_deletes_without_force() {
  let env = TestEnv::new();
  seed_package(&env, "lonely");

  env.manager.delete(NS, "lonely", false).await.unwrap();
  assert!(env.plane().package(NS, "lonely").is_none());
}

#[tokio::test]
async fn deleting_missing_package_fails() {
  let env = TestEnv::new();
  let err = env.manager.delete(NS, "ghost", true).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Input);
}

#[tokio::test]
async fn list_orphans_only() {
  let env = TestEnv::new();
  seed_package(&env, "a");
  seed_package(&env, "b");
  seed_package(&env, "c");
  env.add_function("uses-b", "b");

  let all = env.manager.list(NS, false).await.unwrap();
  assert_eq!(all.len(), 3);

  let orphans: Vec<_> = env
    .manager
    .list(NS, true)
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.metadata.name)
    .collect();
  assert_eq!(orphans, vec!["a", "c"]);
}

#[tokio::test]
async fn sweep_deletes_only_orphans() {
  let env = TestEnv::new();
  seed_package(&env, "a");
  seed_package(&env, "b");
  seed_package(&env, "c");
  env.add_function("uses-b", "b");

  let deleted = env.manager.delete_orphans(NS).await.unwrap();

  assert_eq!(deleted, vec!["a", "c"]);
  assert!(env.plane().package(NS, "b").is_some());
  assert!(env.plane().package(NS, "a").is_none());
}

#[tokio::test]
async fn sweep_stops_at_first_failure() {
  let env = TestEnv::new();
  seed_package(&env, "a");
  seed_package(&env, "b");
  seed_package(&env, "c");
  env.plane().fail_package_deletes(NS, "b");

  let err = env.manager.delete_orphans(NS).await.unwrap_err();

  match &err {
    PackageError::OrphanSweep { deleted, failed, .. } => {
      assert_eq!(deleted, &vec!["a".to_string()]);
      assert_eq!(failed, "b");
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(err.kind(), ErrorKind::Transport);
  assert!(env.plane().package(NS, "a").is_none());
  assert!(env.plane().package(NS, "c").is_some());
}
