use anyhow::{Context, Result};
use clap::Args;

use fnpkg_lib::consts::DEFAULT_NAMESPACE;
use fnpkg_lib::package::{CreateRequest, create_package_spec};
use fnpkg_lib::spec::SpecDir;
use fnpkg_lib::types::{EnvironmentRef, ObjectMeta};

use super::GlobalOpts;
use super::context::{Storage, load_config, run};
use crate::output::{print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct CreateArgs {
  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,

  /// Environment name
  #[arg(long)]
  pub env: Option<String>,

  /// Namespace for environment object
  #[arg(long = "envNamespace", visible_alias = "envns", default_value = DEFAULT_NAMESPACE)]
  pub env_namespace: String,

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

  /// Save to the spec directory instead of creating on the cluster
  #[arg(long)]
  pub spec: bool,
}

impl CreateArgs {
  fn request(&self) -> CreateRequest {
    CreateRequest {
      namespace: self.namespace.clone(),
      environment: EnvironmentRef {
        name: self.env.clone().unwrap_or_default(),
        namespace: self.env_namespace.clone(),
      },
      source: self.src.clone(),
      deployment: self.deploy.clone(),
      build_command: self.buildcmd.clone(),
      skip_compression: self.nozip,
    }
  }
}

pub fn cmd_create(args: &CreateArgs, global: &GlobalOpts) -> Result<()> {
  let req = args.request();
  req.validate()?;

  let meta = if args.spec {
    let config = load_config(global)?;
    let registry = SpecDir::new(&config.spec_dir);
    create_package_spec(&req, &registry).context("Failed to record package spec")?
  } else {
    run(global, Storage::Upload, |manager| async move {
      manager.create(&req).await.context("Failed to create package")
    })?
  };

  report(&meta, args.spec, global)
}

fn report(meta: &ObjectMeta, spec: bool, global: &GlobalOpts) -> Result<()> {
  if global.format.is_json() {
    return print_json(meta);
  }

  if spec {
    print_success(&format!("Package '{}' saved to spec directory", meta.name));
  } else {
    print_success(&format!("Package '{}' created", meta.name));
  }
  print_stat("Namespace", &meta.namespace);
  if !meta.resource_version.is_empty() {
    print_stat("Resource version", &meta.resource_version);
  }
  Ok(())
}
