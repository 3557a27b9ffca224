//! Blob store clients.
//!
//! The storage service accepts multipart uploads at `/v1/archive` and answers
//! with an opaque id; archives are fetched back with `GET /v1/archive?id=<id>`.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;

use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::archive::types::ArchiveError;
use crate::config::BaseUrl;
use crate::consts::STORAGE_ARCHIVE_PATH;

/// Remote blob storage.
pub trait BlobStore {
  /// Upload a local file and return the store's id for it.
  fn upload(&self, path: &Path) -> impl Future<Output = Result<String, ArchiveError>> + Send;

  /// Fetch the bytes behind a fully resolved URL.
  fn download(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ArchiveError>> + Send;
}

/// URL of an archive id on the given storage base.
pub fn archive_url(base: &BaseUrl, id: &str) -> Result<String, ArchiveError> {
  let raw = base.join(STORAGE_ARCHIVE_PATH);
  let mut url = Url::parse(&raw).map_err(|e| ArchiveError::InvalidUrl {
    url: raw.clone(),
    message: e.to_string(),
  })?;
  url.query_pairs_mut().append_pair("id", id);
  Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
  id: String,
}

/// Storage-service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
  client: reqwest::Client,
  upload_base: BaseUrl,
}

impl HttpBlobStore {
  /// Client uploading through `upload_base` (normally the control-plane proxy).
  pub fn new(upload_base: BaseUrl) -> Self {
    Self {
      client: reqwest::Client::new(),
      upload_base,
    }
  }
}

impl BlobStore for HttpBlobStore {
  async fn upload(&self, path: &Path) -> Result<String, ArchiveError> {
    let url = self.upload_base.join(STORAGE_ARCHIVE_PATH);
    let io_err = |source| ArchiveError::Io {
      path: path.to_path_buf(),
      source,
    };

    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let size = file.metadata().await.map_err(io_err)?.len();
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| "archive".to_string());

    let part = Part::stream_with_length(file, size).file_name(file_name);
    let form = Form::new().part("uploadfile", part);

    info!(url = %url, path = %path.display(), size, "uploading archive");
    let response = self
      .client
      .post(&url)
      .header("X-File-Size", size.to_string())
      .multipart(form)
      .send()
      .await
      .map_err(|e| ArchiveError::Request {
        url: url.clone(),
        message: e.to_string(),
      })?;

    if !response.status().is_success() {
      return Err(ArchiveError::HttpStatus {
        url,
        status: response.status().as_u16(),
      });
    }

    let body: UploadResponse = response.json().await.map_err(|e| ArchiveError::InvalidResponse {
      url: url.clone(),
      message: e.to_string(),
    })?;

    debug!(id = %body.id, "upload complete");
    Ok(body.id)
  }

  async fn download(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
    info!(url = %url, "downloading archive");
    let response = self.client.get(url).send().await.map_err(|e| ArchiveError::Request {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(ArchiveError::HttpStatus {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let bytes = response.bytes().await.map_err(|e| ArchiveError::Request {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    debug!(url = %url, size = bytes.len(), "download complete");
    Ok(bytes.to_vec())
  }
}

/// In-process blob store keyed by id.
///
/// Serves downloads for any URL carrying an `id` query parameter it knows.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
  blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, id: &str) -> Option<Vec<u8>> {
    self.lock().get(id).cloned()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
    self.blobs.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl BlobStore for MemoryBlobStore {
  async fn upload(&self, path: &Path) -> Result<String, ArchiveError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ArchiveError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let id = uuid::Uuid::new_v4().to_string();
    self.lock().insert(id.clone(), bytes);
    Ok(id)
  }

  async fn download(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
    let parsed = Url::parse(url).map_err(|e| ArchiveError::InvalidUrl {
      url: url.to_string(),
      message: e.to_string(),
    })?;
    let id = parsed
      .query_pairs()
      .find(|(k, _)| k == "id")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_default();

    self.get(&id).ok_or_else(|| ArchiveError::HttpStatus {
      url: url.to_string(),
      status: 404,
    })
  }
}
