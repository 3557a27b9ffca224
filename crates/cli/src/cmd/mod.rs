mod context;
mod create;
mod delete;
mod get;
mod info;
mod list;
mod rebuild;
mod update;

use clap::Args;

use fnpkg_lib::consts::DEFAULT_NAMESPACE;

use crate::output::OutputFormat;

pub use create::{CreateArgs, cmd_create};
pub use delete::{DeleteArgs, cmd_delete};
pub use get::{GetArgs, cmd_get};
pub use info::cmd_info;
pub use list::{ListArgs, cmd_list};
pub use rebuild::cmd_rebuild;
pub use update::{UpdateArgs, cmd_update};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
  pub server: Option<String>,
  pub storage_url: Option<String>,
  pub format: OutputFormat,
}

/// A package named on the command line.
#[derive(Debug, Args)]
pub struct PackageRef {
  /// Package name
  #[arg(long)]
  pub name: String,

  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,
}
