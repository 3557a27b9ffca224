use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tempfile::NamedTempFile;

use fnpkg_lib::archive::ArchiveSlot;
use fnpkg_lib::consts::DEFAULT_NAMESPACE;

use super::GlobalOpts;
use super::context::{Storage, run};
use crate::output::{format_bytes, print_success};

#[derive(Debug, Args)]
pub struct GetArgs {
  /// Package name
  #[arg(long)]
  pub name: String,

  /// Namespace for package object
  #[arg(long = "pkgNamespace", visible_alias = "pkgns", default_value = DEFAULT_NAMESPACE)]
  pub namespace: String,

  /// File to save the archive content to (stdout if omitted)
  #[arg(short, long)]
  pub output: Option<PathBuf>,
}

pub fn cmd_get(args: &GetArgs, slot: ArchiveSlot, global: &GlobalOpts) -> Result<()> {
  let namespace = args.namespace.clone();
  let name = args.name.clone();
  let bytes = run(global, Storage::ReadOnly, |manager| async move {
    manager
      .fetch_archive(&namespace, &name, slot)
      .await
      .with_context(|| format!("Failed to get {} archive of package '{}'", slot, name))
  })?;

  match &args.output {
    Some(path) => {
      write_atomic(path, &bytes)?;
      if !global.format.is_json() {
        print_success(&format!(
          "Wrote {} ({}) to {}",
          slot,
          format_bytes(bytes.len() as u64),
          path.display()
        ));
      }
    }
    None => {
      let mut stdout = std::io::stdout().lock();
      stdout.write_all(&bytes).context("Failed to write archive to stdout")?;
      stdout.flush()?;
    }
  }

  Ok(())
}

/// Write `bytes` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };

  let mut temp = NamedTempFile::new_in(dir).with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
  temp.write_all(bytes).context("Failed to write archive")?;
  temp.as_file().sync_all().context("Failed to sync archive")?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
      .with_context(|| format!("Failed to set permissions on {}", temp.path().display()))?;
  }

  temp
    .persist(path)
    .with_context(|| format!("Failed to move archive into place at {}", path.display()))?;
  Ok(())
}
