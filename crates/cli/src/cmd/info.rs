use anyhow::{Context, Result};

use fnpkg_lib::archive::Archive;

use super::context::{Storage, run};
use super::{GlobalOpts, PackageRef};
use crate::output::{format_bytes, print_json, print_stat};

pub fn cmd_info(target: &PackageRef, global: &GlobalOpts) -> Result<()> {
  let namespace = target.namespace.clone();
  let name = target.name.clone();
  let package = run(global, Storage::ReadOnly, |manager| async move {
    manager
      .info(&namespace, &name)
      .await
      .with_context(|| format!("Failed to get package '{}'", name))
  })?;

  if global.format.is_json() {
    return print_json(&package);
  }

  print_stat("Name", &package.metadata.name);
  print_stat("Namespace", &package.metadata.namespace);
  print_stat(
    "Environment",
    &format!(
      "{} ({})",
      package.spec.environment.name, package.spec.environment.namespace
    ),
  );
  if let Some(cmd) = &package.spec.build_command {
    print_stat("Build command", cmd);
  }
  if let Some(source) = &package.spec.source {
    print_stat("Source", &describe(source));
  }
  if let Some(deployment) = &package.spec.deployment {
    print_stat("Deployment", &describe(deployment));
  }
  print_stat("Status", &package.status.build_status.to_string());

  if !package.status.build_log.is_empty() {
    println!();
    println!("Build Logs:");
    println!("{}", package.status.build_log);
  }

  Ok(())
}

fn describe(archive: &Archive) -> String {
  match archive {
    Archive::Literal { literal } => format!("literal, {}", format_bytes(literal.len() as u64)),
    Archive::Url { url, .. } => url.clone(),
  }
}
