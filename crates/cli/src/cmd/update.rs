use anyhow::{Context, Result, bail};
use clap::Args;

use fnpkg_lib::consts::DEFAULT_NAMESPACE;
use fnpkg_lib::package::{BuildDecision, SyncReport, UpdateOutcome, UpdateRequest};

use super::GlobalOpts;
use super::context::{Storage, run};
use crate::output::{print_error, print_info, print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct UpdateArgs {
  /// Package name
  #[arg(long)]
  pub name: String,

  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,

  /// Environment name
  #[arg(long)]
  pub env: Option<String>,

  /// Namespace for environment object
  #[arg(long = "envNamespace", visible_alias = "envns")]
  pub env_namespace: Option<String>,

  /// Local path, glob or URL for source archive (repeatable)
  #[arg(long = "src", visible_alias = "sourcearchive")]
  pub src: Vec<String>,

  /// Local path, glob or URL for deployment archive (repeatable)
  #[arg(long = "deploy", visible_alias = "deployarchive")]
  pub deploy: Vec<String>,

  /// Build command for the builder to run with
  #[arg(long)]
  pub buildcmd: Option<String>,

  /// Use a single deployment file as-is instead of zipping it
  #[arg(long)]
  pub nozip: bool,

  /// Update the package even if more than one function uses it
  #[arg(short, long)]
  pub force: bool,
}

impl UpdateArgs {
  fn request(&self) -> UpdateRequest {
    UpdateRequest {
      env_name: self.env.clone(),
      env_namespace: self.env_namespace.clone(),
      source: self.src.clone(),
      deployment: self.deploy.clone(),
      build_command: self.buildcmd.clone(),
      force: self.force,
      force_rebuild: false,
      skip_compression: self.nozip,
    }
  }
}

pub fn cmd_update(args: &UpdateArgs, global: &GlobalOpts) -> Result<()> {
  let req = args.request();
  req.validate()?;

  let namespace = args.namespace.clone();
  let name = args.name.clone();
  let outcome = run(global, Storage::Upload, |manager| async move {
    manager
      .update(&namespace, &name, &req)
      .await
      .with_context(|| format!("Failed to update package '{}'", name))
  })?;

  if global.format.is_json() {
    print_json(&outcome)?;
  } else {
    print_success(&format!("Package '{}' updated", outcome.package.name));
    print_outcome(&outcome);
  }

  check_sync(&outcome.sync)
}

/// Text summary shared by `update` and `rebuild`.
pub(super) fn print_outcome(outcome: &UpdateOutcome) {
  print_stat("Resource version", &outcome.package.resource_version);
  let build = match outcome.build {
    BuildDecision::Rebuild => "pending",
    BuildDecision::Prebuilt => "prebuilt",
    BuildDecision::Unchanged => "unchanged",
  };
  print_stat("Build", build);

  for function in &outcome.sync.updated {
    print_info(&format!("Function '{}' now uses this revision", function));
  }
  for failure in &outcome.sync.failed {
    print_error(&format!(
      "Function '{}' in namespace '{}' was not updated: {}",
      failure.function, failure.namespace, failure.error
    ));
  }
}

/// Turn a partial fan-out into a failing exit after the results are shown.
pub(super) fn check_sync(sync: &SyncReport) -> Result<()> {
  if !sync.is_complete() {
    bail!(
      "{} function(s) still reference an older package revision",
      sync.failed.len()
    );
  }
  Ok(())
}
