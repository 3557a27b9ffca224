//! Fetching archives back returns what was packaged.

use fnpkg_lib::archive::{Archive, ArchiveKind, ArchiveSlot};
use fnpkg_lib::package::{CreateRequest, ErrorKind, PackageError};
use fnpkg_lib::util::hash::checksum_bytes;

use super::common::{NS, TestEnv, env, write_zip, zip_entry};

#[tokio::test]
async fn literal_source_round_trips() {
  let test_env = TestEnv::new();
  let content = b"def main():\n    return 'hello'\n";
  let src = test_env.write_file("fn.py", content);

  let meta = test_env
    .manager
    .create(&CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      source: vec![src],
      ..Default::default()
    })
    .await
    .unwrap();

  let bytes = test_env.manager.fetch_archive(NS, &meta.name, ArchiveSlot::Source).await.unwrap();
  assert_eq!(zip_entry(&bytes, "fn.py"), content);
}

#[tokio::test]
async fn uploaded_source_round_trips() {
  let test_env = TestEnv::with_literal_limit(64);
  let a = b"module.exports = () => 'a';\n".repeat(20);
  let b = b"module.exports = () => 'b';\n".repeat(20);
  test_env.write_file("src/a.js", &a);
  test_env.write_file("src/b.js", &b);
  let glob = test_env.temp.path().join("src/*.js").display().to_string();

  let meta = test_env
    .manager
    .create(&CreateRequest {
      namespace: NS.to_string(),
      environment: env("node"),
      source: vec![glob],
      ..Default::default()
    })
    .await
    .unwrap();

  let pkg = test_env.plane().package(NS, &meta.name).unwrap();
  let stored = pkg.spec.source.unwrap();
  assert_eq!(stored.kind(), ArchiveKind::Url);

  let bytes = test_env.manager.fetch_archive(NS, &meta.name, ArchiveSlot::Source).await.unwrap();
  let Archive::Url { checksum, .. } = stored else {
    unreachable!()
  };
  assert_eq!(checksum, Some(checksum_bytes(&bytes)));
  assert_eq!(zip_entry(&bytes, "a.js"), a);
  assert_eq!(zip_entry(&bytes, "b.js"), b);
}

#[tokio::test]
async fn existing_zip_round_trips_byte_for_byte() {
  let test_env = TestEnv::with_literal_limit(64);
  let path = test_env.temp.path().join("prebuilt.zip");
  write_zip(&path, "main.py", &b"print('prebuilt')\n".repeat(10));
  let original = std::fs::read(&path).unwrap();

  let meta = test_env
    .manager
    .create(&CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      deployment: vec![path.display().to_string()],
      ..Default::default()
    })
    .await
    .unwrap();

  let bytes = test_env
    .manager
    .fetch_archive(NS, &meta.name, ArchiveSlot::Deployment)
    .await
    .unwrap();
  assert_eq!(bytes, original);
}

#[tokio::test]
async fn missing_slot_is_input_error() {
  let test_env = TestEnv::new();
  let src = test_env.write_file("fn.py", b"x = 1");
  let meta = test_env
    .manager
    .create(&CreateRequest {
      namespace: NS.to_string(),
      environment: env("python"),
      source: vec![src],
      ..Default::default()
    })
    .await
    .unwrap();

  let err = test_env
    .manager
    .fetch_archive(NS, &meta.name, ArchiveSlot::Deployment)
    .await
    .unwrap_err();
  assert!(matches!(err, PackageError::NoArchive { .. }));
  assert_eq!(err.kind(), ErrorKind::Input);
}
