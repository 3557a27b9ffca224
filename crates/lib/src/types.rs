//! Records exchanged with the control plane.
//!
//! Field names follow the control-plane JSON encoding. Fields this crate does
//! not interpret are carried in `extra` maps so a read-modify-write cycle
//! never drops them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::archive::{Archive, ArchiveSlot, deserialize_optional_archive};

/// Identity and optimistic-concurrency token of a stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  pub name: String,
  #[serde(default)]
  pub namespace: String,
  /// Opaque token bumped by the store on every persisted mutation.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub resource_version: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ObjectMeta {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      namespace: namespace.into(),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
  pub name: String,
  #[serde(default)]
  pub namespace: String,
}

/// Lifecycle of turning a source archive into a deployment archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
  #[default]
  None,
  Pending,
  Running,
  Succeeded,
  Failed,
}

impl std::fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      BuildStatus::None => "none",
      BuildStatus::Pending => "pending",
      BuildStatus::Running => "running",
      BuildStatus::Succeeded => "succeeded",
      BuildStatus::Failed => "failed",
    };
    write!(f, "{}", s)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
  pub environment: EnvironmentRef,
  #[serde(
    default,
    deserialize_with = "deserialize_optional_archive",
    skip_serializing_if = "Option::is_none"
  )]
  pub source: Option<Archive>,
  #[serde(
    default,
    deserialize_with = "deserialize_optional_archive",
    skip_serializing_if = "Option::is_none"
  )]
  pub deployment: Option<Archive>,
  #[serde(rename = "buildcmd", default, skip_serializing_if = "Option::is_none")]
  pub build_command: Option<String>,
}

impl PackageSpec {
  pub fn archive(&self, slot: ArchiveSlot) -> Option<&Archive> {
    match slot {
      ArchiveSlot::Source => self.source.as_ref(),
      ArchiveSlot::Deployment => self.deployment.as_ref(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageStatus {
  #[serde(rename = "buildstatus", default)]
  pub build_status: BuildStatus,
  /// Appended by the build service.
  #[serde(rename = "buildlog", default)]
  pub build_log: String,
}

impl PackageStatus {
  pub fn new(build_status: BuildStatus) -> Self {
    Self {
      build_status,
      build_log: String::new(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
  pub metadata: ObjectMeta,
  pub spec: PackageSpec,
  #[serde(default)]
  pub status: PackageStatus,
}

/// A function's pin on a specific package revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
  #[serde(default)]
  pub namespace: String,
  pub name: String,
  #[serde(rename = "resourceversion", default)]
  pub resource_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionPackageRef {
  #[serde(rename = "packageref")]
  pub package_ref: PackageRef,
  #[serde(rename = "functionName", default, skip_serializing_if = "String::is_empty")]
  pub function_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
  #[serde(default)]
  pub environment: EnvironmentRef,
  pub package: FunctionPackageRef,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A function record. Only its package reference matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
  pub metadata: ObjectMeta,
  pub spec: FunctionSpec,
}

impl Function {
  /// Whether this function points at the named package.
  ///
  /// A reference without a namespace is resolved in the function's own
  /// namespace.
  pub fn references(&self, namespace: &str, name: &str) -> bool {
    let pkg_ref = &self.spec.package.package_ref;
    let ref_namespace = if pkg_ref.namespace.is_empty() {
      self.metadata.namespace.as_str()
    } else {
      pkg_ref.namespace.as_str()
    };
    pkg_ref.name == name && ref_namespace == namespace
  }
}
