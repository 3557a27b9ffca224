//! Archive model and archive errors.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::spec::SpecError;
use crate::util::hash::{Checksum, ChecksumError};

/// A packaged code payload.
///
/// Serialized with a `type` tag (`literal` / `url`) so exactly one payload
/// representation is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Archive {
  /// Bytes embedded in the record. Self-verifying, so no checksum.
  Literal {
    #[serde(with = "literal_bytes")]
    literal: Vec<u8>,
  },
  /// Remotely stored payload.
  Url {
    url: String,
    /// Present for archives this subsystem uploaded; absent for URLs passed
    /// through unchanged from the caller.
    #[serde(
      default,
      deserialize_with = "crate::util::hash::deserialize_optional",
      skip_serializing_if = "Option::is_none"
    )]
    checksum: Option<Checksum>,
  },
}

/// Decode an optional archive, reading one with a missing or empty `type` as
/// absent.
pub fn deserialize_optional_archive<'de, D>(deserializer: D) -> Result<Option<Archive>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    Some(value) if value.get("type").and_then(Value::as_str).is_some_and(|t| !t.is_empty()) => {
      Archive::deserialize(value).map(Some).map_err(serde::de::Error::custom)
    }
    _ => Ok(None),
  }
}

impl Archive {
  pub fn literal(bytes: Vec<u8>) -> Self {
    Archive::Literal { literal: bytes }
  }

  pub fn url(url: impl Into<String>, checksum: Option<Checksum>) -> Self {
    Archive::Url {
      url: url.into(),
      checksum,
    }
  }

  pub fn kind(&self) -> ArchiveKind {
    match self {
      Archive::Literal { .. } => ArchiveKind::Literal,
      Archive::Url { .. } => ArchiveKind::Url,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
  Literal,
  Url,
}

impl std::fmt::Display for ArchiveKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ArchiveKind::Literal => write!(f, "literal"),
      ArchiveKind::Url => write!(f, "url"),
    }
  }
}

/// Which of a package's two archives an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSlot {
  Source,
  Deployment,
}

impl std::fmt::Display for ArchiveSlot {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ArchiveSlot::Source => write!(f, "source"),
      ArchiveSlot::Deployment => write!(f, "deployment"),
    }
  }
}

/// Base64 encoding for literal bytes, matching the JSON encoding of the
/// control-plane API.
mod literal_bytes {
  use base64::Engine;
  use base64::engine::general_purpose::STANDARD;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
  }
}

/// Errors from building, storing, or retrieving archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
  /// One or more inputs matched nothing on disk.
  #[error("no files found matching {}", format_patterns(.patterns))]
  NoFilesMatched { patterns: Vec<String> },

  #[error("invalid path pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  /// A URL input was combined with other inputs.
  #[error("URL input '{url}' cannot be bundled with other inputs")]
  MixedUrlInput { url: String },

  #[error("no archive inputs given")]
  NoInputs,

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write archive {path}: {message}")]
  Zip { path: PathBuf, message: String },

  #[error(transparent)]
  Checksum(#[from] ChecksumError),

  /// The request never produced a response.
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },

  /// The remote answered with a non-success status.
  #[error("{url} returned HTTP {status}")]
  HttpStatus { url: String, status: u16 },

  #[error("unexpected response from {url}: {message}")]
  InvalidResponse { url: String, message: String },

  #[error("invalid archive URL '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
  ChecksumMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// The archive is only a declarative reference and has no bytes yet.
  #[error("archive '{url}' is a declarative reference and has not been uploaded")]
  Unrealized { url: String },

  #[error(transparent)]
  Spec(#[from] SpecError),
}

fn format_patterns(patterns: &[String]) -> String {
  patterns
    .iter()
    .map(|p| format!("\"{}\"", p))
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::checksum_bytes;

  #[test]
  fn literal_serializes_as_base64() {
    let archive = Archive::literal(b"print('hi')".to_vec());
    let json = serde_json::to_value(&archive).unwrap();
    assert_eq!(json["type"], "literal");
    assert_eq!(json["literal"], "cHJpbnQoJ2hpJyk=");

    let back: Archive = serde_json::from_value(json).unwrap();
    assert_eq!(back, archive);
  }

  #[test]
  fn passthrough_url_omits_checksum() {
    let archive = Archive::url("https://example.com/fn.zip", None);
    let json = serde_json::to_value(&archive).unwrap();
    assert_eq!(json["type"], "url");
    assert!(json.get("checksum").is_none());
    assert!(json.get("literal").is_none());
  }

  #[test]
  fn uploaded_url_carries_checksum() {
    let sum = checksum_bytes(b"payload");
    let archive = Archive::url("http://storage/v1/archive?id=1", Some(sum.clone()));
    let json = serde_json::to_value(&archive).unwrap();
    assert_eq!(json["checksum"]["sum"], sum.sum);
    assert_eq!(archive.kind(), ArchiveKind::Url);
  }

  #[test]
  fn no_files_error_lists_every_pattern() {
    let err = ArchiveError::NoFilesMatched {
      patterns: vec!["a/*.py".to_string(), "b.js".to_string()],
    };
    assert_eq!(err.to_string(), "no files found matching \"a/*.py\", \"b.js\"");
  }
}
