//! Declarative artifact registry.
//!
//! In spec mode nothing is uploaded or created remotely. Archives are recorded
//! as `ArchiveUploadSpec` documents and packages as package documents, to be
//! reconciled later. Before recording, the registry is searched for a
//! structurally identical document so repeated runs reuse existing names.
//!
//! # Storage Layout
//!
//! ```text
//! {spec_dir}/
//! ├── archive-<name>.yaml   # ArchiveUploadSpec
//! └── package-<name>.yaml   # Package
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{ObjectMeta, Package};

#[derive(Debug, Error)]
pub enum SpecError {
  #[error("failed to read spec {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse spec {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("failed to write spec {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize spec: {0}")]
  Serialize(String),
}

/// Recorded intent to build an archive from the given inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveUploadSpec {
  pub name: String,
  #[serde(rename = "include")]
  pub include_globs: Vec<String>,
}

impl ArchiveUploadSpec {
  /// Same inputs, regardless of name. Content is deliberately not compared.
  pub fn same_inputs(&self, other: &ArchiveUploadSpec) -> bool {
    self.include_globs == other.include_globs
  }
}

/// A single document in the spec directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpecDocument {
  ArchiveUploadSpec(ArchiveUploadSpec),
  Package(Package),
}

/// Lookup and persistence of declarative documents.
pub trait SpecRegistry {
  /// Name of an already-recorded archive spec with identical inputs.
  fn find_archive(&self, candidate: &ArchiveUploadSpec) -> Result<Option<String>, SpecError>;

  fn save_archive(&self, spec: &ArchiveUploadSpec) -> Result<(), SpecError>;

  /// Metadata of an already-recorded package with an identical spec, ignoring
  /// its name and status.
  fn find_package(&self, candidate: &Package) -> Result<Option<ObjectMeta>, SpecError>;

  fn save_package(&self, package: &Package) -> Result<(), SpecError>;
}

/// Registry backed by YAML files in a directory.
#[derive(Debug, Clone)]
pub struct SpecDir {
  base_path: PathBuf,
}

impl SpecDir {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Load every document in the directory, in file-name order.
  ///
  /// A missing directory is an empty registry.
  pub fn load_all(&self) -> Result<Vec<SpecDocument>, SpecError> {
    let entries = match fs::read_dir(&self.base_path) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(SpecError::Read {
          path: self.base_path.clone(),
          source,
        });
      }
    };

    let mut paths: Vec<PathBuf> = entries
      .flatten()
      .map(|e| e.path())
      .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
      .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
      let content = fs::read_to_string(&path).map_err(|source| SpecError::Read {
        path: path.clone(),
        source,
      })?;
      let doc: SpecDocument = serde_yaml::from_str(&content).map_err(|e| SpecError::Parse {
        path: path.clone(),
        message: e.to_string(),
      })?;
      docs.push(doc);
    }

    Ok(docs)
  }

  /// Write a document atomically (temp file, then rename).
  fn write(&self, file_name: &str, doc: &SpecDocument) -> Result<(), SpecError> {
    fs::create_dir_all(&self.base_path).map_err(|source| SpecError::Write {
      path: self.base_path.clone(),
      source,
    })?;

    let path = self.base_path.join(file_name);
    let temp_path = self.base_path.join(format!("{}.tmp", file_name));
    let content = serde_yaml::to_string(doc).map_err(|e| SpecError::Serialize(e.to_string()))?;

    fs::write(&temp_path, content).map_err(|source| SpecError::Write {
      path: temp_path.clone(),
      source,
    })?;
    fs::rename(&temp_path, &path).map_err(|source| SpecError::Write {
      path: path.clone(),
      source,
    })?;

    debug!(path = %path.display(), "wrote spec");
    Ok(())
  }
}

impl SpecRegistry for SpecDir {
  fn find_archive(&self, candidate: &ArchiveUploadSpec) -> Result<Option<String>, SpecError> {
    Ok(self.load_all()?.into_iter().find_map(|doc| match doc {
      SpecDocument::ArchiveUploadSpec(spec) if spec.same_inputs(candidate) => Some(spec.name),
      _ => None,
    }))
  }

  fn save_archive(&self, spec: &ArchiveUploadSpec) -> Result<(), SpecError> {
    self.write(
      &format!("archive-{}.yaml", spec.name),
      &SpecDocument::ArchiveUploadSpec(spec.clone()),
    )
  }

  fn find_package(&self, candidate: &Package) -> Result<Option<ObjectMeta>, SpecError> {
    Ok(self.load_all()?.into_iter().find_map(|doc| match doc {
      SpecDocument::Package(pkg)
        if pkg.metadata.namespace == candidate.metadata.namespace && pkg.spec == candidate.spec =>
      {
        Some(pkg.metadata)
      }
      _ => None,
    }))
  }

  fn save_package(&self, package: &Package) -> Result<(), SpecError> {
    self.write(
      &format!("package-{}.yaml", package.metadata.name),
      &SpecDocument::Package(package.clone()),
    )
  }
}
