//! Remote control-plane store.
//!
//! Packages and functions are keyed by `(namespace, name)`. Every write returns
//! the stored object's new metadata, whose `resource_version` is the
//! optimistic-concurrency token: an update carrying a stale token fails with
//! [`ControlError::Conflict`] instead of overwriting.
//!
//! # Submodules
//!
//! - [`http`] - REST client for the controller API
//! - [`memory`] - In-process store with the same concurrency rules

pub mod http;
pub mod memory;

use std::future::Future;

use thiserror::Error;

use crate::types::{Function, ObjectMeta, Package};

/// Kind of record a control-plane error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
  Package,
  Function,
}

impl std::fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ResourceKind::Package => write!(f, "package"),
      ResourceKind::Function => write!(f, "function"),
    }
  }
}

#[derive(Debug, Error)]
pub enum ControlError {
  #[error("{kind} '{name}' not found in namespace '{namespace}'")]
  NotFound {
    kind: ResourceKind,
    namespace: String,
    name: String,
  },

  #[error("{kind} '{name}' already exists in namespace '{namespace}'")]
  AlreadyExists {
    kind: ResourceKind,
    namespace: String,
    name: String,
  },

  /// The write targeted a stale resource version.
  #[error("conflict updating {kind} '{name}' in namespace '{namespace}': {message}")]
  Conflict {
    kind: ResourceKind,
    namespace: String,
    name: String,
    message: String,
  },

  #[error("{url} returned HTTP {status}: {body}")]
  HttpStatus { url: String, status: u16, body: String },

  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },

  #[error("failed to decode response from {url}: {message}")]
  Decode { url: String, message: String },
}

/// CRUD access to package and function records.
pub trait ControlPlane {
  fn get_package(&self, namespace: &str, name: &str) -> impl Future<Output = Result<Package, ControlError>> + Send;

  fn create_package(&self, package: &Package) -> impl Future<Output = Result<ObjectMeta, ControlError>> + Send;

  /// Persist `package`, which must carry the resource version it was read at.
  fn update_package(&self, package: &Package) -> impl Future<Output = Result<ObjectMeta, ControlError>> + Send;

  fn delete_package(&self, namespace: &str, name: &str) -> impl Future<Output = Result<(), ControlError>> + Send;

  fn list_packages(&self, namespace: &str) -> impl Future<Output = Result<Vec<Package>, ControlError>> + Send;

  fn get_function(&self, namespace: &str, name: &str) -> impl Future<Output = Result<Function, ControlError>> + Send;

  fn create_function(&self, function: &Function) -> impl Future<Output = Result<ObjectMeta, ControlError>> + Send;

  fn update_function(&self, function: &Function) -> impl Future<Output = Result<ObjectMeta, ControlError>> + Send;

  fn delete_function(&self, namespace: &str, name: &str) -> impl Future<Output = Result<(), ControlError>> + Send;

  fn list_functions(&self, namespace: &str) -> impl Future<Output = Result<Vec<Function>, ControlError>> + Send;
}
