use anyhow::{Context, Result};

use super::context::{Storage, run};
use super::update::{check_sync, print_outcome};
use super::{GlobalOpts, PackageRef};
use crate::output::{print_json, print_success};

pub fn cmd_rebuild(target: &PackageRef, global: &GlobalOpts) -> Result<()> {
  let namespace = target.namespace.clone();
  let name = target.name.clone();
  let outcome = run(global, Storage::ReadOnly, |manager| async move {
    manager
      .rebuild(&namespace, &name)
      .await
      .with_context(|| format!("Failed to rebuild package '{}'", name))
  })?;

  if global.format.is_json() {
    print_json(&outcome)?;
  } else {
    print_success(&format!("Retrying build for package '{}'", outcome.package.name));
    print_outcome(&outcome);
  }

  check_sync(&outcome.sync)
}
