use serde::Serialize;
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveSlot};
use crate::control::ControlError;
use crate::spec::SpecError;
use crate::types::{BuildStatus, EnvironmentRef, ObjectMeta};

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
  /// Bad or missing arguments. Fix the request.
  Input,
  /// The request clashes with current state. Re-issue with corrected intent.
  Conflict,
  /// A remote call or local read failed. The whole operation may be retried.
  Transport,
}

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("need an environment name")]
  MissingEnvironment,

  #[error("need a source archive or a deployment archive")]
  MissingArchive,

  #[error("need either a source archive or a deployment archive, not both")]
  SourceAndDeployment,

  #[error("nothing to update: need an environment, source archive, deployment archive or build command")]
  NothingToUpdate,

  #[error("package '{name}' is not in failed state (currently {status})")]
  NotFailed { name: String, status: BuildStatus },

  #[error("package '{name}' is used by {count} functions, use force to update it")]
  MultipleReferences { name: String, count: usize },

  #[error("package '{name}' is used by {count} function(s), use force to delete it")]
  Referenced { name: String, count: usize },

  #[error("package '{name}' has no {slot} archive")]
  NoArchive { name: String, slot: ArchiveSlot },

  /// The sweep stopped at `failed`; `deleted` were already removed.
  #[error("failed to delete orphan package '{failed}' (already deleted: [{}]): {source}", .deleted.join(", "))]
  OrphanSweep {
    deleted: Vec<String>,
    failed: String,
    #[source]
    source: ControlError,
  },

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error(transparent)]
  Control(#[from] ControlError),

  #[error(transparent)]
  Spec(#[from] SpecError),
}

impl PackageError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      PackageError::MissingEnvironment
      | PackageError::MissingArchive
      | PackageError::SourceAndDeployment
      | PackageError::NothingToUpdate
      | PackageError::NoArchive { .. } => ErrorKind::Input,
      PackageError::NotFailed { .. } | PackageError::MultipleReferences { .. } | PackageError::Referenced { .. } => {
        ErrorKind::Conflict
      }
      PackageError::OrphanSweep { source, .. } => control_kind(source),
      PackageError::Archive(e) => archive_kind(e),
      PackageError::Control(e) => control_kind(e),
      PackageError::Spec(SpecError::Parse { .. }) => ErrorKind::Input,
      PackageError::Spec(_) => ErrorKind::Transport,
    }
  }
}

fn archive_kind(error: &ArchiveError) -> ErrorKind {
  match error {
    ArchiveError::NoFilesMatched { .. }
    | ArchiveError::InvalidPattern { .. }
    | ArchiveError::MixedUrlInput { .. }
    | ArchiveError::NoInputs
    | ArchiveError::Unrealized { .. } => ErrorKind::Input,
    ArchiveError::Spec(SpecError::Parse { .. }) => ErrorKind::Input,
    _ => ErrorKind::Transport,
  }
}

fn control_kind(error: &ControlError) -> ErrorKind {
  match error {
    ControlError::NotFound { .. } => ErrorKind::Input,
    ControlError::AlreadyExists { .. } | ControlError::Conflict { .. } => ErrorKind::Conflict,
    _ => ErrorKind::Transport,
  }
}

/// Inputs for a new package.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
  pub namespace: String,
  pub environment: EnvironmentRef,
  /// Path, glob, or URL inputs for the source archive.
  pub source: Vec<String>,
  /// Path, glob, or URL inputs for the deployment archive.
  pub deployment: Vec<String>,
  pub build_command: Option<String>,
  /// Use a single deployment input file verbatim instead of zipping it.
  pub skip_compression: bool,
}

impl CreateRequest {
  pub fn validate(&self) -> Result<(), PackageError> {
    if self.environment.name.is_empty() {
      return Err(PackageError::MissingEnvironment);
    }
    if self.source.is_empty() && self.deployment.is_empty() {
      return Err(PackageError::MissingArchive);
    }
    Ok(())
  }
}

/// Requested changes to an existing package.
///
/// `None` and empty values leave the corresponding field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
  pub env_name: Option<String>,
  pub env_namespace: Option<String>,
  pub source: Vec<String>,
  pub deployment: Vec<String>,
  pub build_command: Option<String>,
  /// Allow updating a package shared by several functions.
  pub force: bool,
  /// Mark the package pending regardless of what changed.
  pub force_rebuild: bool,
  pub skip_compression: bool,
}

impl UpdateRequest {
  /// Reject requests that mix archive kinds or change nothing.
  pub fn validate(&self) -> Result<(), PackageError> {
    if !self.source.is_empty() && !self.deployment.is_empty() {
      return Err(PackageError::SourceAndDeployment);
    }

    let has_text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    if self.source.is_empty()
      && self.deployment.is_empty()
      && !has_text(&self.env_name)
      && !has_text(&self.env_namespace)
      && !has_text(&self.build_command)
    {
      return Err(PackageError::NothingToUpdate);
    }
    Ok(())
  }
}

/// Which spec fields an update actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecChanges {
  pub environment: bool,
  pub environment_namespace: bool,
  pub build_command: bool,
  pub source: bool,
  pub deployment: bool,
}

/// What an update does to the build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildDecision {
  /// A build is owed: status becomes pending.
  Rebuild,
  /// A new deployment archive was supplied: status becomes succeeded.
  Prebuilt,
  /// Status left as it was.
  Unchanged,
}

/// One function whose package reference could not be advanced.
#[derive(Debug, Serialize)]
pub struct SyncFailure {
  pub namespace: String,
  pub function: String,
  #[serde(serialize_with = "serialize_display")]
  pub error: ControlError,
}

/// Result of advancing referencing functions to a new package revision.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
  pub resource_version: String,
  pub updated: Vec<String>,
  pub failed: Vec<SyncFailure>,
}

impl SyncReport {
  pub fn is_complete(&self) -> bool {
    self.failed.is_empty()
  }
}

/// A successful package write plus the fan-out that followed it.
#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
  pub package: ObjectMeta,
  pub build: BuildDecision,
  pub sync: SyncReport,
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(value)
}
