use anyhow::{Context, Result};
use clap::Args;

use fnpkg_lib::consts::DEFAULT_NAMESPACE;

use super::GlobalOpts;
use super::context::{Storage, run};
use crate::output::{package_table, print_json};

#[derive(Debug, Args)]
pub struct ListArgs {
  /// Only packages that no function references
  #[arg(long)]
  pub orphan: bool,

  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,
}

pub fn cmd_list(args: &ListArgs, global: &GlobalOpts) -> Result<()> {
  let namespace = args.namespace.clone();
  let orphan = args.orphan;
  let packages = run(global, Storage::ReadOnly, |manager| async move {
    manager.list(&namespace, orphan).await.context("Failed to list packages")
  })?;

  if global.format.is_json() {
    print_json(&packages)
  } else {
    print!("{}", package_table(&packages));
    Ok(())
  }
}
