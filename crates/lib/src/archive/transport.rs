//! Archive transport: literal embedding or blob-store upload, and retrieval.

use std::path::Path;

use reqwest::Url;
use tracing::{debug, info};

use crate::archive::blob::{BlobStore, archive_url};
use crate::archive::builder::ArchiveSource;
use crate::archive::types::{Archive, ArchiveError};
use crate::config::StorageEndpoints;
use crate::consts::ARCHIVE_URL_PREFIX;
use crate::util::hash::{checksum_bytes, checksum_file};

/// Moves archives between local files, package records, and the blob store.
#[derive(Debug)]
pub struct ArchiveTransport<B> {
  blob: B,
  endpoints: StorageEndpoints,
  literal_size_limit: u64,
}

impl<B: BlobStore + Sync> ArchiveTransport<B> {
  pub fn new(blob: B, endpoints: StorageEndpoints, literal_size_limit: u64) -> Self {
    Self {
      blob,
      endpoints,
      literal_size_limit,
    }
  }

  pub fn blob(&self) -> &B {
    &self.blob
  }

  pub fn endpoints(&self) -> &StorageEndpoints {
    &self.endpoints
  }

  /// Turn a local file into an `Archive`.
  ///
  /// Files smaller than the literal limit are embedded. Larger files are
  /// uploaded and referenced by a URL on the external storage address, with a
  /// checksum of the local bytes.
  pub async fn store(&self, path: &Path) -> Result<Archive, ArchiveError> {
    let io_err = |source| ArchiveError::Io {
      path: path.to_path_buf(),
      source,
    };
    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();

    if size < self.literal_size_limit {
      debug!(path = %path.display(), size, "embedding archive as literal");
      let bytes = tokio::fs::read(path).await.map_err(io_err)?;
      return Ok(Archive::literal(bytes));
    }

    let id = self.blob.upload(path).await?;
    let url = archive_url(&self.endpoints.external_base, &id)?;

    let owned = path.to_path_buf();
    let checksum = tokio::task::spawn_blocking(move || checksum_file(&owned))
      .await
      .map_err(|e| ArchiveError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
      })??;

    info!(url = %url, size, checksum = %checksum, "archive uploaded");
    Ok(Archive::url(url, Some(checksum)))
  }

  /// Store whatever the builder produced.
  pub async fn store_source(&self, source: &ArchiveSource) -> Result<Archive, ArchiveError> {
    match source {
      ArchiveSource::Remote(url) => Ok(Archive::url(url.clone(), None)),
      ArchiveSource::Local(local) => self.store(local.path()).await,
    }
  }

  /// Fetch an archive's bytes.
  ///
  /// URL archives are always downloaded through the storage proxy, and their
  /// checksum, when recorded, must match what was downloaded.
  pub async fn retrieve(&self, archive: &Archive) -> Result<Vec<u8>, ArchiveError> {
    match archive {
      Archive::Literal { literal } => Ok(literal.clone()),
      Archive::Url { url, checksum } => {
        if url.starts_with(ARCHIVE_URL_PREFIX) {
          return Err(ArchiveError::Unrealized { url: url.clone() });
        }

        let proxied = self.proxied_url(url)?;
        let bytes = self.blob.download(&proxied).await?;

        if let Some(expected) = checksum {
          let actual = checksum_bytes(&bytes);
          if actual != *expected {
            return Err(ArchiveError::ChecksumMismatch {
              url: url.clone(),
              expected: expected.to_string(),
              actual: actual.to_string(),
            });
          }
          debug!(url = %url, "checksum verified");
        }

        Ok(bytes)
      }
    }
  }

  /// Rewrite a stored URL so it is fetched through the storage proxy.
  ///
  /// Keeps the path and query of `url` and swaps everything before them for
  /// the internal proxy base.
  pub fn proxied_url(&self, url: &str) -> Result<String, ArchiveError> {
    let parsed = Url::parse(url).map_err(|e| ArchiveError::InvalidUrl {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    let mut request_uri = parsed.path().to_string();
    if let Some(query) = parsed.query() {
      request_uri.push('?');
      request_uri.push_str(query);
    }

    Ok(self.endpoints.internal_proxy_base.join(&request_uri))
  }
}
