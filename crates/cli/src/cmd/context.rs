//! Wiring a `PackageManager` from configuration.

use anyhow::{Context, Result};
use tracing::debug;

use fnpkg_lib::archive::blob::HttpBlobStore;
use fnpkg_lib::archive::transport::ArchiveTransport;
use fnpkg_lib::config::Config;
use fnpkg_lib::control::http::HttpControlPlane;
use fnpkg_lib::package::PackageManager;

use super::GlobalOpts;

pub type Manager = PackageManager<HttpControlPlane, HttpBlobStore>;

/// Whether the command may upload archives.
///
/// Uploaded archives are recorded under the external storage address, which
/// has to be looked up when it is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
  Upload,
  ReadOnly,
}

/// Environment configuration with command-line overrides applied.
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
  let mut config = Config::from_env().context("Invalid configuration")?;
  if let Some(server) = &global.server {
    config = config.with_server(server).context("Invalid --server")?;
  }
  if let Some(storage) = &global.storage_url {
    config = config.with_storage_url(storage).context("Invalid --storage-url")?;
  }
  Ok(config)
}

pub async fn connect(config: &Config, storage: Storage) -> Result<Manager> {
  let control = HttpControlPlane::new(config.server_url.clone());

  let external_base = match (&config.storage_url, storage) {
    (Some(url), _) => url.clone(),
    (None, Storage::Upload) => control
      .discover_storage_url()
      .await
      .context("Failed to look up the storage service address")?,
    (None, Storage::ReadOnly) => config.internal_proxy_base(),
  };
  debug!(server = %config.server_url, storage = %external_base, "connecting");

  let blob = HttpBlobStore::new(config.internal_proxy_base());
  let transport = ArchiveTransport::new(blob, config.storage_endpoints(external_base), config.literal_size_limit);
  Ok(PackageManager::new(control, transport))
}

/// Run `f` against a connected manager on a fresh runtime.
pub fn run<T, F, Fut>(global: &GlobalOpts, storage: Storage, f: F) -> Result<T>
where
  F: FnOnce(Manager) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let config = load_config(global)?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let manager = connect(&config, storage).await?;
    f(manager).await
  })
}
