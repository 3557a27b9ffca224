//! Package record lifecycle.
//!
//! Every write is a single read-modify-write of the package record carrying
//! the resource version it was read at. Archives are stored before the
//! record is touched, so a failed upload leaves the record unchanged, and the
//! function fan-out only starts after the store acknowledged the write.

use tracing::{debug, info};

use super::sync::{count_references, functions_referencing, propagate_resource_version};
use super::types::{BuildDecision, CreateRequest, PackageError, SpecChanges, UpdateOutcome, UpdateRequest};
use crate::archive::blob::BlobStore;
use crate::archive::builder::{base_name, check_inputs, prepare_archive, record_archive_spec};
use crate::archive::transport::ArchiveTransport;
use crate::archive::{Archive, ArchiveSlot};
use crate::consts::NAME_SUFFIX_LEN;
use crate::control::ControlPlane;
use crate::spec::SpecRegistry;
use crate::types::{BuildStatus, ObjectMeta, Package, PackageSpec, PackageStatus};
use crate::util::name::{kubify_name, random_suffix};

/// Decide the build status change for a set of spec changes.
///
/// A forced rebuild always owes a build. Otherwise a new deployment archive
/// means the package is prebuilt, even if other fields changed alongside it.
/// Any other change owes a build.
pub fn decide_build(changes: &SpecChanges, force_rebuild: bool) -> BuildDecision {
  if force_rebuild {
    BuildDecision::Rebuild
  } else if changes.deployment {
    BuildDecision::Prebuilt
  } else if changes.environment || changes.environment_namespace || changes.build_command || changes.source {
    BuildDecision::Rebuild
  } else {
    BuildDecision::Unchanged
  }
}

/// Name for a new package, derived from its first input.
///
/// Source inputs take precedence over deployment inputs. Without any input
/// the name is a random UUID.
pub fn package_name(source: &[String], deployment: &[String]) -> String {
  match source.first().or_else(|| deployment.first()) {
    Some(first) => kubify_name(&format!("{}-{}", base_name(first), random_suffix(NAME_SUFFIX_LEN))),
    None => uuid::Uuid::new_v4().to_string().to_lowercase(),
  }
}

fn initial_status(req: &CreateRequest, declarative: bool) -> BuildStatus {
  if !req.source.is_empty() {
    BuildStatus::Pending
  } else if declarative {
    BuildStatus::None
  } else {
    BuildStatus::Succeeded
  }
}

fn new_package(req: &CreateRequest, source: Option<Archive>, deployment: Option<Archive>, declarative: bool) -> Package {
  Package {
    metadata: ObjectMeta::new(req.namespace.clone(), package_name(&req.source, &req.deployment)),
    spec: PackageSpec {
      environment: req.environment.clone(),
      source,
      deployment,
      build_command: req.build_command.clone().filter(|c| !c.is_empty()),
    },
    status: PackageStatus::new(initial_status(req, declarative)),
  }
}

/// Record a package as declarative specs instead of creating it remotely.
///
/// Archives become `ArchiveUploadSpec` documents referenced by
/// `archive://<name>`. A recorded package with an identical spec is reused.
pub fn create_package_spec(req: &CreateRequest, registry: &impl SpecRegistry) -> Result<ObjectMeta, PackageError> {
  req.validate()?;

  let deployment = if req.deployment.is_empty() {
    None
  } else {
    Some(record_archive_spec(&req.deployment, registry)?)
  };
  let source = if req.source.is_empty() {
    None
  } else {
    Some(record_archive_spec(&req.source, registry)?)
  };

  let package = new_package(req, source, deployment, true);

  if let Some(existing) = registry.find_package(&package)? {
    info!(name = %existing.name, "re-using previously recorded package");
    return Ok(existing);
  }

  registry.save_package(&package)?;
  info!(name = %package.metadata.name, "recorded package spec");
  Ok(package.metadata)
}

/// Package operations against a control plane and a blob store.
#[derive(Debug)]
pub struct PackageManager<C, B> {
  control: C,
  transport: ArchiveTransport<B>,
}

impl<C: ControlPlane + Sync, B: BlobStore + Sync> PackageManager<C, B> {
  pub fn new(control: C, transport: ArchiveTransport<B>) -> Self {
    Self { control, transport }
  }

  pub fn control(&self) -> &C {
    &self.control
  }

  pub fn transport(&self) -> &ArchiveTransport<B> {
    &self.transport
  }

  /// Build and store the archives, then create the package record.
  pub async fn create(&self, req: &CreateRequest) -> Result<ObjectMeta, PackageError> {
    req.validate()?;
    check_inputs(&req.source)?;
    check_inputs(&req.deployment)?;

    let deployment = if req.deployment.is_empty() {
      None
    } else {
      Some(self.store_inputs(&req.deployment, req.skip_compression).await?)
    };
    let source = if req.source.is_empty() {
      None
    } else {
      Some(self.store_inputs(&req.source, false).await?)
    };

    let package = new_package(req, source, deployment, false);
    let meta = self.control.create_package(&package).await?;
    info!(
      name = %meta.name,
      namespace = %meta.namespace,
      status = %package.status.build_status,
      "package created"
    );
    Ok(meta)
  }

  /// Update a package and advance every function referencing it.
  ///
  /// A package referenced by more than one function is only updated with
  /// `force`. Function updates that fail are listed in the outcome's sync
  /// report; the package update itself stands.
  pub async fn update(&self, namespace: &str, name: &str, req: &UpdateRequest) -> Result<UpdateOutcome, PackageError> {
    req.validate()?;

    let package = self.control.get_package(namespace, name).await?;
    let functions = functions_referencing(&self.control, namespace, name).await?;

    if !req.force && functions.len() > 1 {
      return Err(PackageError::MultipleReferences {
        name: name.to_string(),
        count: functions.len(),
      });
    }

    let (meta, build) = self.update_record(package, req).await?;
    let sync = propagate_resource_version(&self.control, functions, &meta.resource_version).await;

    Ok(UpdateOutcome {
      package: meta,
      build,
      sync,
    })
  }

  /// Apply `req` to `package` and persist it in one write.
  ///
  /// Environment values equal to the current ones count as unspecified.
  /// Does not touch referencing functions.
  pub async fn update_record(
    &self,
    mut package: Package,
    req: &UpdateRequest,
  ) -> Result<(ObjectMeta, BuildDecision), PackageError> {
    check_inputs(&req.source)?;
    check_inputs(&req.deployment)?;

    let mut changes = SpecChanges::default();
    let env = &mut package.spec.environment;

    if let Some(env_name) = non_empty(&req.env_name).filter(|n| *n != env.name) {
      env.name = env_name.to_string();
      changes.environment = true;
    }
    if let Some(env_namespace) = non_empty(&req.env_namespace).filter(|n| *n != env.namespace) {
      env.namespace = env_namespace.to_string();
      changes.environment_namespace = true;
    }
    if let Some(cmd) = non_empty(&req.build_command) {
      package.spec.build_command = Some(cmd.to_string());
      changes.build_command = true;
    }
    if !req.source.is_empty() {
      package.spec.source = Some(self.store_inputs(&req.source, false).await?);
      changes.source = true;
    }
    if !req.deployment.is_empty() {
      package.spec.deployment = Some(self.store_inputs(&req.deployment, req.skip_compression).await?);
      changes.deployment = true;
    }

    let decision = decide_build(&changes, req.force_rebuild);
    debug!(name = %package.metadata.name, ?changes, ?decision, "build decision");
    match decision {
      BuildDecision::Rebuild => package.status = PackageStatus::new(BuildStatus::Pending),
      BuildDecision::Prebuilt => package.status = PackageStatus::new(BuildStatus::Succeeded),
      BuildDecision::Unchanged => {}
    }

    let meta = self.control.update_package(&package).await?;
    info!(
      name = %meta.name,
      namespace = %meta.namespace,
      version = %meta.resource_version,
      status = %package.status.build_status,
      "package updated"
    );
    Ok((meta, decision))
  }

  /// Retry the build of a failed package.
  pub async fn rebuild(&self, namespace: &str, name: &str) -> Result<UpdateOutcome, PackageError> {
    let package = self.control.get_package(namespace, name).await?;
    if package.status.build_status != BuildStatus::Failed {
      return Err(PackageError::NotFailed {
        name: name.to_string(),
        status: package.status.build_status,
      });
    }

    let req = UpdateRequest {
      force_rebuild: true,
      ..Default::default()
    };
    let (meta, build) = self.update_record(package, &req).await?;

    let functions = functions_referencing(&self.control, namespace, name).await?;
    let sync = propagate_resource_version(&self.control, functions, &meta.resource_version).await;

    info!(name = %name, namespace = %namespace, "retrying package build");
    Ok(UpdateOutcome {
      package: meta,
      build,
      sync,
    })
  }

  /// Delete a package, refusing while functions reference it unless forced.
  pub async fn delete(&self, namespace: &str, name: &str, force: bool) -> Result<(), PackageError> {
    self.control.get_package(namespace, name).await?;

    let functions = functions_referencing(&self.control, namespace, name).await?;
    if !force && !functions.is_empty() {
      return Err(PackageError::Referenced {
        name: name.to_string(),
        count: functions.len(),
      });
    }

    self.control.delete_package(namespace, name).await?;
    info!(name = %name, namespace = %namespace, "package deleted");
    Ok(())
  }

  /// Delete every package in `namespace` that no function references.
  ///
  /// Stops at the first failed delete; the error names the packages already
  /// removed. Returns the deleted names.
  pub async fn delete_orphans(&self, namespace: &str) -> Result<Vec<String>, PackageError> {
    let packages = self.control.list_packages(namespace).await?;
    let functions = self.control.list_functions(namespace).await?;

    let mut deleted = Vec::new();
    for package in packages {
      let name = package.metadata.name;
      if count_references(&functions, namespace, &name) > 0 {
        continue;
      }

      if let Err(source) = self.control.delete_package(namespace, &name).await {
        return Err(PackageError::OrphanSweep {
          deleted,
          failed: name,
          source,
        });
      }
      info!(name = %name, namespace = %namespace, "orphan package deleted");
      deleted.push(name);
    }

    Ok(deleted)
  }

  /// Packages in `namespace`, optionally only those no function references.
  pub async fn list(&self, namespace: &str, orphans_only: bool) -> Result<Vec<Package>, PackageError> {
    let packages = self.control.list_packages(namespace).await?;
    if !orphans_only {
      return Ok(packages);
    }

    let functions = self.control.list_functions(namespace).await?;
    Ok(
      packages
        .into_iter()
        .filter(|p| count_references(&functions, &p.metadata.namespace, &p.metadata.name) == 0)
        .collect(),
    )
  }

  pub async fn info(&self, namespace: &str, name: &str) -> Result<Package, PackageError> {
    Ok(self.control.get_package(namespace, name).await?)
  }

  /// Bytes of one of a package's archives.
  pub async fn fetch_archive(&self, namespace: &str, name: &str, slot: ArchiveSlot) -> Result<Vec<u8>, PackageError> {
    let package = self.control.get_package(namespace, name).await?;
    let archive = package.spec.archive(slot).ok_or_else(|| PackageError::NoArchive {
      name: name.to_string(),
      slot,
    })?;
    Ok(self.transport.retrieve(archive).await?)
  }

  async fn store_inputs(&self, inputs: &[String], skip_compression: bool) -> Result<Archive, PackageError> {
    let source = prepare_archive(inputs, skip_compression)?;
    Ok(self.transport.store_source(&source).await?)
  }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.is_empty())
}
