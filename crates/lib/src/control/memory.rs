//! In-process control plane.
//!
//! Keeps records in memory with a single revision counter shared by every
//! object, so each persisted mutation yields a new, increasing
//! `resource_version`. Updates must carry the stored version exactly.
//!
//! Besides the [`ControlPlane`] operations it can stand in for the build
//! service (`set_build_status`) and inject failures into chosen function
//! updates or package deletes.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{ControlError, ControlPlane, ResourceKind};
use crate::types::{BuildStatus, Function, ObjectMeta, Package};

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
  revision: u64,
  packages: BTreeMap<Key, Package>,
  functions: BTreeMap<Key, Function>,
  failing_function_updates: HashSet<Key>,
  failing_package_deletes: HashSet<Key>,
}

impl State {
  fn next_revision(&mut self) -> String {
    self.revision += 1;
    self.revision.to_string()
  }
}

#[derive(Debug, Default)]
pub struct MemoryControlPlane {
  state: Mutex<State>,
}

fn key(namespace: &str, name: &str) -> Key {
  (namespace.to_string(), name.to_string())
}

fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ControlError {
  ControlError::NotFound {
    kind,
    namespace: namespace.to_string(),
    name: name.to_string(),
  }
}

fn injected(kind: ResourceKind, namespace: &str, name: &str) -> ControlError {
  ControlError::HttpStatus {
    url: format!("memory://{}/{}/{}", kind, namespace, name),
    status: 500,
    body: "injected failure".to_string(),
  }
}

/// An update must name a stored object and carry its current version.
fn check_version(
  kind: ResourceKind,
  meta: &ObjectMeta,
  stored: Option<&ObjectMeta>,
) -> Result<(), ControlError> {
  let stored = stored.ok_or_else(|| not_found(kind, &meta.namespace, &meta.name))?;
  if stored.resource_version != meta.resource_version {
    return Err(ControlError::Conflict {
      kind,
      namespace: meta.namespace.clone(),
      name: meta.name.clone(),
      message: format!(
        "resource version '{}' is stale, current is '{}'",
        meta.resource_version, stored.resource_version
      ),
    });
  }
  Ok(())
}

impl MemoryControlPlane {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Store a package as-is, assigning it a fresh resource version.
  pub fn insert_package(&self, mut package: Package) -> ObjectMeta {
    let mut state = self.lock();
    package.metadata.resource_version = state.next_revision();
    let meta = package.metadata.clone();
    state.packages.insert(key(&meta.namespace, &meta.name), package);
    meta
  }

  /// Store a function as-is, assigning it a fresh resource version.
  pub fn insert_function(&self, mut function: Function) -> ObjectMeta {
    let mut state = self.lock();
    function.metadata.resource_version = state.next_revision();
    let meta = function.metadata.clone();
    state.functions.insert(key(&meta.namespace, &meta.name), function);
    meta
  }

  pub fn package(&self, namespace: &str, name: &str) -> Option<Package> {
    self.lock().packages.get(&key(namespace, name)).cloned()
  }

  pub fn function(&self, namespace: &str, name: &str) -> Option<Function> {
    self.lock().functions.get(&key(namespace, name)).cloned()
  }

  /// Act as the build service: move a package to `status` with `log`.
  pub fn set_build_status(&self, namespace: &str, name: &str, status: BuildStatus, log: &str) -> Option<ObjectMeta> {
    let mut state = self.lock();
    let k = key(namespace, name);
    if !state.packages.contains_key(&k) {
      return None;
    }
    let revision = state.next_revision();
    let package = state.packages.get_mut(&k)?;
    package.status.build_status = status;
    package.status.build_log = log.to_string();
    package.metadata.resource_version = revision;
    Some(package.metadata.clone())
  }

  /// Make every later update of this function fail.
  pub fn fail_function_updates(&self, namespace: &str, name: &str) {
    self.lock().failing_function_updates.insert(key(namespace, name));
  }

  /// Make every later delete of this package fail.
  pub fn fail_package_deletes(&self, namespace: &str, name: &str) {
    self.lock().failing_package_deletes.insert(key(namespace, name));
  }
}

impl ControlPlane for MemoryControlPlane {
  async fn get_package(&self, namespace: &str, name: &str) -> Result<Package, ControlError> {
    self
      .package(namespace, name)
      .ok_or_else(|| not_found(ResourceKind::Package, namespace, name))
  }

  async fn create_package(&self, package: &Package) -> Result<ObjectMeta, ControlError> {
    let mut state = self.lock();
    let k = key(&package.metadata.namespace, &package.metadata.name);
    if state.packages.contains_key(&k) {
      return Err(ControlError::AlreadyExists {
        kind: ResourceKind::Package,
        namespace: k.0,
        name: k.1,
      });
    }

    let mut stored = package.clone();
    stored.metadata.resource_version = state.next_revision();
    let meta = stored.metadata.clone();
    state.packages.insert(k, stored);
    debug!(name = %meta.name, version = %meta.resource_version, "package created");
    Ok(meta)
  }

  async fn update_package(&self, package: &Package) -> Result<ObjectMeta, ControlError> {
    let mut state = self.lock();
    let k = key(&package.metadata.namespace, &package.metadata.name);
    check_version(
      ResourceKind::Package,
      &package.metadata,
      state.packages.get(&k).map(|p| &p.metadata),
    )?;

    let mut stored = package.clone();
    stored.metadata.resource_version = state.next_revision();
    let meta = stored.metadata.clone();
    state.packages.insert(k, stored);
    debug!(name = %meta.name, version = %meta.resource_version, "package updated");
    Ok(meta)
  }

  async fn delete_package(&self, namespace: &str, name: &str) -> Result<(), ControlError> {
    let mut state = self.lock();
    let k = key(namespace, name);
    if state.failing_package_deletes.contains(&k) {
      return Err(injected(ResourceKind::Package, namespace, name));
    }
    state
      .packages
      .remove(&k)
      .map(|_| ())
      .ok_or_else(|| not_found(ResourceKind::Package, namespace, name))
  }

  async fn list_packages(&self, namespace: &str) -> Result<Vec<Package>, ControlError> {
    Ok(
      self
        .lock()
        .packages
        .values()
        .filter(|p| p.metadata.namespace == namespace)
        .cloned()
        .collect(),
    )
  }

  async fn get_function(&self, namespace: &str, name: &str) -> Result<Function, ControlError> {
    self
      .function(namespace, name)
      .ok_or_else(|| not_found(ResourceKind::Function, namespace, name))
  }

  async fn create_function(&self, function: &Function) -> Result<ObjectMeta, ControlError> {
    let mut state = self.lock();
    let k = key(&function.metadata.namespace, &function.metadata.name);
    if state.functions.contains_key(&k) {
      return Err(ControlError::AlreadyExists {
        kind: ResourceKind::Function,
        namespace: k.0,
        name: k.1,
      });
    }

    let mut stored = function.clone();
    stored.metadata.resource_version = state.next_revision();
    let meta = stored.metadata.clone();
    state.functions.insert(k, stored);
    Ok(meta)
  }

  async fn update_function(&self, function: &Function) -> Result<ObjectMeta, ControlError> {
    let mut state = self.lock();
    let k = key(&function.metadata.namespace, &function.metadata.name);
    if state.failing_function_updates.contains(&k) {
      return Err(injected(ResourceKind::Function, &k.0, &k.1));
    }
    check_version(
      ResourceKind::Function,
      &function.metadata,
      state.functions.get(&k).map(|f| &f.metadata),
    )?;

    let mut stored = function.clone();
    stored.metadata.resource_version = state.next_revision();
    let meta = stored.metadata.clone();
    state.functions.insert(k, stored);
    Ok(meta)
  }

  async fn delete_function(&self, namespace: &str, name: &str) -> Result<(), ControlError> {
    self
      .lock()
      .functions
      .remove(&key(namespace, name))
      .map(|_| ())
      .ok_or_else(|| not_found(ResourceKind::Function, namespace, name))
  }

  async fn list_functions(&self, namespace: &str) -> Result<Vec<Function>, ControlError> {
    Ok(
      self
        .lock()
        .functions
        .values()
        .filter(|f| f.metadata.namespace == namespace)
        .cloned()
        .collect(),
    )
  }
}
