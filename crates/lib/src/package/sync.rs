//! Keeping functions pinned to a package's latest revision.

use tracing::{info, warn};

use super::types::{SyncFailure, SyncReport};
use crate::control::{ControlError, ControlPlane};
use crate::types::Function;

/// Functions in `namespace` whose package reference names the package.
pub async fn functions_referencing<C: ControlPlane>(
  control: &C,
  namespace: &str,
  name: &str,
) -> Result<Vec<Function>, ControlError> {
  let functions = control.list_functions(namespace).await?;
  Ok(functions.into_iter().filter(|f| f.references(namespace, name)).collect())
}

/// Number of functions in an already-fetched list that reference the package.
pub fn count_references(functions: &[Function], namespace: &str, name: &str) -> usize {
  functions.iter().filter(|f| f.references(namespace, name)).count()
}

/// Point every function at `resource_version`.
///
/// Each function is updated independently. Failures are collected in the
/// report and do not stop the remaining updates.
pub async fn propagate_resource_version<C: ControlPlane>(
  control: &C,
  functions: Vec<Function>,
  resource_version: &str,
) -> SyncReport {
  let mut report = SyncReport {
    resource_version: resource_version.to_string(),
    ..Default::default()
  };

  for mut function in functions {
    function.spec.package.package_ref.resource_version = resource_version.to_string();
    let name = function.metadata.name.clone();
    let namespace = function.metadata.namespace.clone();

    match control.update_function(&function).await {
      Ok(_) => {
        info!(function = %name, namespace = %namespace, version = %resource_version, "function package reference updated");
        report.updated.push(name);
      }
      Err(error) => {
        warn!(function = %name, namespace = %namespace, error = %error, "failed to update function package reference");
        report.failed.push(SyncFailure {
          namespace,
          function: name,
          error,
        });
      }
    }
  }

  report
}
