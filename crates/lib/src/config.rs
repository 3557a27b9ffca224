//! Explicit client configuration.
//!
//! Every operation receives its endpoints through a `Config` value rather than
//! a process-wide default, so tests can point the subsystem at fakes.
//!
//! Values come from, in increasing precedence: built-in defaults, environment
//! variables (`FNPKG_SERVER`, `FNPKG_STORAGE_URL`, `FNPKG_LITERAL_LIMIT`,
//! `FNPKG_SPEC_DIR`), and explicit overrides (CLI flags).

use std::path::PathBuf;

use reqwest::Url;
use thiserror::Error;

use crate::consts::{DEFAULT_SERVER_URL, DEFAULT_SPEC_DIR, LITERAL_SIZE_LIMIT, STORAGE_PROXY_PATH};

pub const SERVER_ENV: &str = "FNPKG_SERVER";
pub const STORAGE_URL_ENV: &str = "FNPKG_STORAGE_URL";
pub const LITERAL_LIMIT_ENV: &str = "FNPKG_LITERAL_LIMIT";
pub const SPEC_DIR_ENV: &str = "FNPKG_SPEC_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid URL '{value}': {message}")]
  InvalidUrl { value: String, message: String },

  #[error("invalid value for {var}: '{value}'")]
  InvalidValue { var: &'static str, value: String },
}

/// An absolute http(s) base address, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
  pub fn parse(value: &str) -> Result<Self, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
      value: value.to_string(),
      message: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
      return Err(ConfigError::InvalidUrl {
        value: value.to_string(),
        message: format!("unsupported scheme '{}'", url.scheme()),
      });
    }

    Ok(Self(value.trim_end_matches('/').to_string()))
  }

  /// Append an absolute path (or path and query) to this base.
  pub fn join(&self, path: &str) -> String {
    if path.starts_with('/') {
      format!("{}{}", self.0, path)
    } else {
      format!("{}/{}", self.0, path)
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for BaseUrl {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The two addresses of the blob store.
///
/// Uploads and downloads go through `internal_proxy_base`, but URLs recorded in
/// package records are built from `external_base` so they stay resolvable
/// outside the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEndpoints {
  pub internal_proxy_base: BaseUrl,
  pub external_base: BaseUrl,
}

#[derive(Debug, Clone)]
pub struct Config {
  /// Control-plane front door.
  pub server_url: BaseUrl,
  /// Externally reachable storage-service address, if known up front.
  pub storage_url: Option<BaseUrl>,
  /// Archives below this size are embedded as literals.
  pub literal_size_limit: u64,
  /// Directory holding declarative specs.
  pub spec_dir: PathBuf,
}

impl Config {
  pub fn new(server_url: BaseUrl) -> Self {
    Self {
      server_url,
      storage_url: None,
      literal_size_limit: LITERAL_SIZE_LIMIT,
      spec_dir: PathBuf::from(DEFAULT_SPEC_DIR),
    }
  }

  /// Build a config from defaults and environment variables.
  pub fn from_env() -> Result<Self, ConfigError> {
    let server = std::env::var(SERVER_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let mut config = Self::new(BaseUrl::parse(&server)?);

    if let Ok(storage) = std::env::var(STORAGE_URL_ENV) {
      config.storage_url = Some(BaseUrl::parse(&storage)?);
    }

    if let Ok(limit) = std::env::var(LITERAL_LIMIT_ENV) {
      config.literal_size_limit = limit.parse().map_err(|_| ConfigError::InvalidValue {
        var: LITERAL_LIMIT_ENV,
        value: limit.clone(),
      })?;
    }

    if let Ok(dir) = std::env::var(SPEC_DIR_ENV) {
      config.spec_dir = PathBuf::from(dir);
    }

    Ok(config)
  }

  pub fn with_server(mut self, server: &str) -> Result<Self, ConfigError> {
    self.server_url = BaseUrl::parse(server)?;
    Ok(self)
  }

  pub fn with_storage_url(mut self, storage: &str) -> Result<Self, ConfigError> {
    self.storage_url = Some(BaseUrl::parse(storage)?);
    Ok(self)
  }

  /// The storage proxy reachable through the control plane.
  pub fn internal_proxy_base(&self) -> BaseUrl {
    BaseUrl(self.server_url.join(STORAGE_PROXY_PATH))
  }

  /// Pair the proxy address with an externally reachable storage address.
  pub fn storage_endpoints(&self, external_base: BaseUrl) -> StorageEndpoints {
    StorageEndpoints {
      internal_proxy_base: self.internal_proxy_base(),
      external_base,
    }
  }
}
