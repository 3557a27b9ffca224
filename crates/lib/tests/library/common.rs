//! Shared helpers for library integration tests.

use std::io::Read;
use std::path::Path;

use fnpkg_lib::archive::blob::MemoryBlobStore;
use fnpkg_lib::archive::transport::ArchiveTransport;
use fnpkg_lib::config::{BaseUrl, StorageEndpoints};
use fnpkg_lib::consts::LITERAL_SIZE_LIMIT;
use fnpkg_lib::control::memory::MemoryControlPlane;
use fnpkg_lib::package::PackageManager;
use fnpkg_lib::types::{EnvironmentRef, Function, FunctionPackageRef, FunctionSpec, ObjectMeta, PackageRef};
use tempfile::TempDir;

pub type Manager = PackageManager<MemoryControlPlane, MemoryBlobStore>;

pub const NS: &str = "default";

/// Isolated environment: a scratch directory and a manager over in-memory
/// collaborators.
pub struct TestEnv {
  pub temp: TempDir,
  pub manager: Manager,
}

impl TestEnv {
  pub fn new() -> Self {
    Self::with_literal_limit(LITERAL_SIZE_LIMIT)
  }

  pub fn with_literal_limit(limit: u64) -> Self {
    let endpoints = StorageEndpoints {
      internal_proxy_base: BaseUrl::parse("http://controller.test/proxy/storage").unwrap(),
      external_base: BaseUrl::parse("http://storage.test").unwrap(),
    };
    let transport = ArchiveTransport::new(MemoryBlobStore::new(), endpoints, limit);
    Self {
      temp: TempDir::new().unwrap(),
      manager: PackageManager::new(MemoryControlPlane::new(), transport),
    }
  }

  pub fn plane(&self) -> &MemoryControlPlane {
    self.manager.control()
  }

  /// Write a file relative to the temp directory and return its path.
  pub fn write_file(&self, relative_path: &str, content: &[u8]) -> String {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
  }

  /// Seed a function pinned to the package's current resource version.
  pub fn add_function(&self, name: &str, package: &str) {
    let version = self
      .plane()
      .package(NS, package)
      .map(|p| p.metadata.resource_version)
      .unwrap_or_default();

    self.plane().insert_function(Function {
      metadata: ObjectMeta::new(NS, name),
      spec: FunctionSpec {
        environment: env("python"),
        package: FunctionPackageRef {
          package_ref: PackageRef {
            namespace: NS.to_string(),
            name: package.to_string(),
            resource_version: version,
          },
          function_name: "main".to_string(),
        },
        ..Default::default()
      },
    });
  }

  pub fn function_version(&self, name: &str) -> String {
    self
      .plane()
      .function(NS, name)
      .unwrap()
      .spec
      .package
      .package_ref
      .resource_version
  }
}

pub fn env(name: &str) -> EnvironmentRef {
  EnvironmentRef {
    name: name.to_string(),
    namespace: NS.to_string(),
  }
}

/// Contents of one entry of an in-memory zip.
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
  let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
  let mut entry = archive.by_name(name).unwrap();
  let mut out = Vec::new();
  entry.read_to_end(&mut out).unwrap();
  out
}

/// Write a zip holding one stored (uncompressed) entry.
pub fn write_zip(path: &Path, name: &str, content: &[u8]) {
  use std::io::Write;
  use zip::write::SimpleFileOptions;

  let file = std::fs::File::create(path).unwrap();
  let mut zip = zip::ZipWriter::new(file);
  let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
  zip.start_file(name, options).unwrap();
  zip.write_all(content).unwrap();
  zip.finish().unwrap();
}
