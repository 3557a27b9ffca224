//! Content identity for archives.
//!
//! A `Checksum` is a full SHA-256 digest of an archive's bytes. It travels with
//! URL archives as an integrity proof for the remote fetch, and is recomputed
//! on download to verify what came back.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
  Sha256,
}

impl std::fmt::Display for ChecksumType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ChecksumType::Sha256 => write!(f, "sha256"),
    }
  }
}

/// An algorithm-tagged digest.
///
/// # Format
///
/// `sum` is a lowercase hexadecimal string (64 characters for SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
  #[serde(rename = "type")]
  pub kind: ChecksumType,
  pub sum: String,
}

impl std::fmt::Display for Checksum {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.kind, self.sum)
  }
}

/// Decode an optional checksum, reading one with a missing or empty `type`
/// as absent.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<Checksum>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    Some(value) if value.get("type").and_then(Value::as_str).is_some_and(|t| !t.is_empty()) => {
      Checksum::deserialize(value).map(Some).map_err(serde::de::Error::custom)
    }
    _ => Ok(None),
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash everything a reader yields, in fixed-size chunks.
///
/// The digest is only produced once the reader reports end of stream; a read
/// error mid-way returns the error and no digest.
pub fn checksum_reader<R: Read>(mut reader: R) -> std::io::Result<Checksum> {
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = match reader.read(&mut buffer) {
      Ok(0) => break,
      Ok(n) => n,
      Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(e),
    };
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Checksum {
    kind: ChecksumType::Sha256,
    sum: hex::encode(hasher.finalize()),
  })
}

/// Hash a file's contents without loading it into memory.
pub fn checksum_file(path: &Path) -> Result<Checksum, ChecksumError> {
  let read_err = |source| ChecksumError::Read {
    path: path.display().to_string(),
    source,
  };
  let file = fs::File::open(path).map_err(read_err)?;
  checksum_reader(file).map_err(read_err)
}

/// Hash an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> Checksum {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Checksum {
    kind: ChecksumType::Sha256,
    sum: hex::encode(hasher.finalize()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io;
  use tempfile::tempdir;

  // sha256("hello world")
  const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

  #[test]
  fn checksum_bytes_matches_known_digest() {
    let sum = checksum_bytes(b"hello world");
    assert_eq!(sum.kind, ChecksumType::Sha256);
    assert_eq!(sum.sum, HELLO_SHA256);
  }

  #[test]
  fn checksum_file_matches_bytes() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("fn.py");
    fs::write(&path, "hello world").unwrap();

    assert_eq!(checksum_file(&path).unwrap(), checksum_bytes(b"hello world"));
  }

  #[test]
  fn checksum_spans_multiple_chunks() {
    let data = vec![7u8; 8192 * 3 + 17];
    let streamed = checksum_reader(io::Cursor::new(&data)).unwrap();
    assert_eq!(streamed, checksum_bytes(&data));
  }

  #[test]
  fn checksum_missing_file_names_path() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("nope.zip");

    let err = checksum_file(&missing).unwrap_err();
    assert!(err.to_string().contains("nope.zip"));
  }

  struct FailingReader {
    served: bool,
  }

  impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
      if self.served {
        return Err(io::Error::other("connection reset"));
      }
      self.served = true;
      buf[0] = b'x';
      Ok(1)
    }
  }

  #[test]
  fn read_error_yields_no_digest() {
    let result = checksum_reader(FailingReader { served: false });
    assert!(result.is_err());
  }

  #[test]
  fn checksum_serializes_with_type_tag() {
    let json = serde_json::to_value(checksum_bytes(b"hello world")).unwrap();
    assert_eq!(json["type"], "sha256");
    assert_eq!(json["sum"], HELLO_SHA256);
  }

  #[derive(Deserialize)]
  struct Holder {
    #[serde(default, deserialize_with = "deserialize_optional")]
    checksum: Option<Checksum>,
  }

  #[test]
  fn empty_checksum_type_reads_as_absent() {
    for raw in [
      serde_json::json!({"checksum": {"type": "", "sum": ""}}),
      serde_json::json!({"checksum": {"sum": HELLO_SHA256}}),
      serde_json::json!({"checksum": null}),
      serde_json::json!({}),
    ] {
      let holder: Holder = serde_json::from_value(raw.clone()).unwrap();
      assert!(holder.checksum.is_none(), "{raw}");
    }

    let holder: Holder = serde_json::from_value(serde_json::json!({
      "checksum": {"type": "sha256", "sum": HELLO_SHA256}
    }))
    .unwrap();
    assert_eq!(holder.checksum, Some(checksum_bytes(b"hello world")));
  }

  #[test]
  fn unknown_checksum_type_is_rejected() {
    let result = serde_json::from_value::<Holder>(serde_json::json!({
      "checksum": {"type": "md5", "sum": "5eb63bbbe01eeed093cb22bb8f5acdc3"}
    }));
    assert!(result.is_err());
  }
}
