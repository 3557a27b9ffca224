mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cmd::{CreateArgs, DeleteArgs, GetArgs, GlobalOpts, ListArgs, PackageRef, UpdateArgs};
use fnpkg_lib::archive::ArchiveSlot;
use output::OutputFormat;

/// fnpkg - Build and ship function packages
#[derive(Parser)]
#[command(name = "fnpkg")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Control-plane URL (overrides FNPKG_SERVER)
  #[arg(long, global = true)]
  server: Option<String>,

  /// Externally reachable storage-service URL (overrides FNPKG_STORAGE_URL)
  #[arg(long, global = true)]
  storage_url: Option<String>,

  /// Output format for command results
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage packages
  #[command(subcommand, visible_alias = "pkg")]
  Package(PackageCommand),
}

#[derive(Subcommand)]
enum PackageCommand {
  /// Create a new package
  Create(CreateArgs),

  /// Update a package and the functions that use it
  Update(UpdateArgs),

  /// Rebuild a failed package
  Rebuild(PackageRef),

  /// Get source archive content
  Getsrc(GetArgs),

  /// Get deployment archive content
  Getdeploy(GetArgs),

  /// Show package information
  Info(PackageRef),

  /// List packages
  List(ListArgs),

  /// Delete a package, or every package no function uses
  Delete(DeleteArgs),
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose {
    LevelFilter::DEBUG
  } else {
    LevelFilter::WARN
  };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let global = GlobalOpts {
    server: cli.server,
    storage_url: cli.storage_url,
    format: cli.format,
  };

  match cli.command {
    Commands::Package(command) => match command {
      PackageCommand::Create(args) => cmd::cmd_create(&args, &global),
      PackageCommand::Update(args) => cmd::cmd_update(&args, &global),
      PackageCommand::Rebuild(target) => cmd::cmd_rebuild(&target, &global),
      PackageCommand::Getsrc(args) => cmd::cmd_get(&args, ArchiveSlot::Source, &global),
      PackageCommand::Getdeploy(args) => cmd::cmd_get(&args, ArchiveSlot::Deployment, &global),
      PackageCommand::Info(target) => cmd::cmd_info(&target, &global),
      PackageCommand::List(args) => cmd::cmd_list(&args, &global),
      PackageCommand::Delete(args) => cmd::cmd_delete(&args, &global),
    },
  }
}
