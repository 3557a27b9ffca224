use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use serde::Serialize;

use fnpkg_lib::consts::DEFAULT_NAMESPACE;

use super::GlobalOpts;
use super::context::{Storage, run};
use crate::output::{print_info, print_json, print_success};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["name", "orphan"])))]
pub struct DeleteArgs {
  /// Package name
  #[arg(long)]
  pub name: Option<String>,

  /// Delete every package that no function references
  #[arg(long)]
  pub orphan: bool,

  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,

  /// Delete the package even if functions reference it
  #[arg(short, long)]
  pub force: bool,
}

#[derive(Debug, Serialize)]
struct Deleted {
  namespace: String,
  deleted: Vec<String>,
}

pub fn cmd_delete(args: &DeleteArgs, global: &GlobalOpts) -> Result<()> {
  let namespace = args.namespace.clone();
  let name = args.name.clone();
  let force = args.force;

  let deleted = run(global, Storage::ReadOnly, |manager| async move {
    match name {
      Some(name) => manager
        .delete(&namespace, &name, force)
        .await
        .map(|()| vec![name.clone()])
        .with_context(|| format!("Failed to delete package '{}'", name)),
      None => manager
        .delete_orphans(&namespace)
        .await
        .context("Failed to delete orphan packages"),
    }
  })?;

  if global.format.is_json() {
    return print_json(&Deleted {
      namespace: args.namespace.clone(),
      deleted,
    });
  }

  if args.orphan && deleted.is_empty() {
    print_info("No orphan packages found");
  }
  for name in &deleted {
    print_success(&format!("Package '{}' deleted", name));
  }
  Ok(())
}
