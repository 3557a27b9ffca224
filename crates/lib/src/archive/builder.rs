//! Archive construction from path, glob, and URL inputs.
//!
//! The builder turns a caller's input list into one of:
//! - a remote URL passed through untouched (a single http(s) input),
//! - a single local file used verbatim (already a zip, or compression skipped),
//! - a freshly written zip in a per-operation scratch directory.
//!
//! In spec mode it records an `ArchiveUploadSpec` instead, reusing the name of
//! an existing spec with the same inputs.
//!
//! Zip entries are named relative to the literal root of the input that
//! matched them: the parent of a plain path, or the longest glob-free prefix
//! of a pattern.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::archive::types::{Archive, ArchiveError};
use crate::consts::{ARCHIVE_URL_PREFIX, NAME_SUFFIX_LEN, RANDOM_NAME_LEN};
use crate::spec::{ArchiveUploadSpec, SpecRegistry};
use crate::util::name::{kubify_name, random_suffix};

/// Local file header and empty-archive signatures.
const ZIP_MAGIC: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// What the builder produced for a set of inputs.
#[derive(Debug)]
pub enum ArchiveSource {
  /// A remote URL used as the archive's location as-is.
  Remote(String),
  /// A local file ready for transport.
  Local(LocalArchive),
}

/// A local archive file.
///
/// When the file was generated, the scratch directory holding it lives as
/// long as this value and is removed on drop.
#[derive(Debug)]
pub struct LocalArchive {
  path: PathBuf,
  _scratch: Option<TempDir>,
}

impl LocalArchive {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// A matched input path and the directory its archive entry is named from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPath {
  pub path: PathBuf,
  pub base: PathBuf,
}

pub fn is_url(input: &str) -> bool {
  input.starts_with("http://") || input.starts_with("https://")
}

fn has_glob_meta(pattern: &str) -> bool {
  pattern.contains(['*', '?', '[', '{'])
}

/// Split a pattern into the directory it is walked from (its longest
/// glob-free prefix) and the components left to match below it.
///
/// The root is empty when the pattern starts with a glob component, in which
/// case matches are relative to the working directory.
fn glob_root(pattern: &str) -> (PathBuf, Vec<&str>) {
  let components: Vec<&str> = pattern.split('/').collect();
  let literal_len = components.iter().take_while(|c| !has_glob_meta(c)).count();
  let root = if literal_len == 0 {
    PathBuf::new()
  } else if components[..literal_len] == [""] {
    PathBuf::from("/")
  } else {
    PathBuf::from(components[..literal_len].join("/"))
  };
  (root, components[literal_len..].to_vec())
}

fn walk_error(fallback: &Path, err: walkdir::Error) -> ArchiveError {
  ArchiveError::Io {
    path: err.path().unwrap_or(fallback).to_path_buf(),
    source: err.into(),
  }
}

/// Expand a single path or glob pattern into matching paths, sorted.
///
/// Plain paths match themselves if they exist. Patterns are matched
/// component-wise (`*` does not cross `/`; `**` does). Directories that
/// cannot be read while walking are reported as errors.
pub fn find_glob(pattern: &str) -> Result<Vec<PathBuf>, ArchiveError> {
  if !has_glob_meta(pattern) {
    let path = PathBuf::from(pattern);
    return Ok(if path.exists() { vec![path] } else { Vec::new() });
  }

  let matcher = GlobBuilder::new(pattern)
    .literal_separator(true)
    .build()
    .map_err(|e| ArchiveError::InvalidPattern {
      pattern: pattern.to_string(),
      message: e.to_string(),
    })?
    .compile_matcher();

  let (root, remaining) = glob_root(pattern);
  let implicit_root = root.as_os_str().is_empty();
  let walk_from = if implicit_root { PathBuf::from(".") } else { root };
  if !walk_from.is_dir() {
    return Ok(Vec::new());
  }

  let mut walker = WalkDir::new(&walk_from).min_depth(1).sort_by_file_name();
  if !remaining.contains(&"**") {
    walker = walker.max_depth(remaining.len());
  }

  let mut matches = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| walk_error(&walk_from, e))?;
    let candidate = if implicit_root {
      entry.path().strip_prefix(".").unwrap_or(entry.path()).to_path_buf()
    } else {
      entry.path().to_path_buf()
    };
    if matcher.is_match(&candidate) {
      matches.push(candidate);
    }
  }

  matches.sort();
  Ok(matches)
}

/// Check that every non-URL input matches at least one path.
///
/// All failing inputs are reported together.
pub fn check_inputs(inputs: &[String]) -> Result<(), ArchiveError> {
  let mut missing = Vec::new();
  for input in inputs.iter().filter(|i| !is_url(i)) {
    if find_glob(input)?.is_empty() {
      missing.push(input.clone());
    }
  }

  if missing.is_empty() {
    Ok(())
  } else {
    Err(ArchiveError::NoFilesMatched { patterns: missing })
  }
}

/// Expand all inputs, failing if any input matches nothing.
///
/// A path is dropped when it was already matched, or when one of its
/// ancestors matched as a directory (the directory walk archives it).
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<InputPath>, ArchiveError> {
  check_inputs(inputs)?;

  let mut matched: Vec<InputPath> = Vec::new();
  for input in inputs {
    let glob_base = has_glob_meta(input).then(|| glob_root(input).0);
    for path in find_glob(input)? {
      if matched.iter().any(|m| m.path == path) {
        continue;
      }
      let base = match &glob_base {
        Some(root) => root.clone(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
      };
      matched.push(InputPath { path, base });
    }
  }

  let dirs: Vec<PathBuf> = matched.iter().filter(|m| m.path.is_dir()).map(|m| m.path.clone()).collect();
  matched.retain(|m| {
    let covered = m.path.ancestors().skip(1).any(|a| dirs.iter().any(|d| d == a));
    if covered {
      debug!(path = %m.path.display(), "already archived through a matched directory");
    }
    !covered
  });
  Ok(matched)
}

/// Name for a new archive: `<hint>-<suffix>`.
///
/// Without an explicit hint, the normalized base name of the first input is
/// used; without any input the name is fully random.
pub fn archive_name(hint: Option<&str>, inputs: &[String]) -> String {
  if let Some(hint) = hint.filter(|h| !h.is_empty()) {
    return format!("{}-{}", hint, random_suffix(NAME_SUFFIX_LEN));
  }

  match inputs.first() {
    Some(first) => format!(
      "{}-{}",
      kubify_name(&base_name(first)),
      random_suffix(NAME_SUFFIX_LEN)
    ),
    None => random_suffix(RANDOM_NAME_LEN),
  }
}

/// Last path component of an input, ignoring trailing slashes.
pub fn base_name(input: &str) -> String {
  let trimmed = input.trim_end_matches('/');
  trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

/// Whether the file is already a zip archive, judged by its signature.
pub fn is_zip_file(path: &Path) -> Result<bool, ArchiveError> {
  let io_err = |source| ArchiveError::Io {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(io_err)?;
  let mut magic = [0u8; 4];
  match file.read_exact(&mut magic) {
    Ok(()) => Ok(ZIP_MAGIC.iter().any(|m| **m == magic)),
    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
    Err(e) => Err(io_err(e)),
  }
}

/// Produce an archive for transport from the caller's inputs.
///
/// `skip_compression` only applies when the inputs resolve to exactly one
/// file; with more files it is ignored and a zip is built.
pub fn prepare_archive(inputs: &[String], skip_compression: bool) -> Result<ArchiveSource, ArchiveError> {
  if let Some(url) = inputs.iter().find(|i| is_url(i)) {
    if inputs.len() == 1 {
      debug!(url = %url, "using remote archive as-is");
      return Ok(ArchiveSource::Remote(url.clone()));
    }
    return Err(ArchiveError::MixedUrlInput { url: url.clone() });
  }

  if inputs.is_empty() {
    return Err(ArchiveError::NoInputs);
  }

  let files = expand_inputs(inputs)?;

  if let [InputPath { path: single, .. }] = files.as_slice() {
    if single.is_file() && (skip_compression || is_zip_file(single)?) {
      debug!(path = %single.display(), skip_compression, "using input file as archive");
      return Ok(ArchiveSource::Local(LocalArchive {
        path: single.clone(),
        _scratch: None,
      }));
    }
  }

  if skip_compression && files.len() > 1 {
    debug!(count = files.len(), "ignoring skip-compression for multiple input files");
  }

  let scratch = tempfile::Builder::new()
    .prefix("fnpkg-")
    .tempdir()
    .map_err(|source| ArchiveError::Io {
      path: std::env::temp_dir(),
      source,
    })?;
  let target = scratch.path().join(archive_name(None, inputs));

  write_zip(&target, &files)?;
  info!(path = %target.display(), files = files.len(), "created archive");

  Ok(ArchiveSource::Local(LocalArchive {
    path: target,
    _scratch: Some(scratch),
  }))
}

/// Write a zip containing the given files and directory trees.
///
/// Each entry is named by its path relative to its input's base, so a
/// directory input keeps its own name as the top-level entry. An entry whose
/// name was already written is skipped.
pub fn write_zip(target: &Path, inputs: &[InputPath]) -> Result<(), ArchiveError> {
  let zip_err = |e: zip::result::ZipError| ArchiveError::Zip {
    path: target.to_path_buf(),
    message: e.to_string(),
  };

  let file = fs::File::create(target).map_err(|source| ArchiveError::Io {
    path: target.to_path_buf(),
    source,
  })?;
  let mut zip = zip::ZipWriter::new(file);
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  let mut written = HashSet::new();

  for input in inputs {
    for entry in WalkDir::new(&input.path).sort_by_file_name() {
      let entry = entry.map_err(|e| walk_error(&input.path, e))?;
      let rel = entry.path().strip_prefix(&input.base).unwrap_or(entry.path());
      let name = rel
        .components()
        .filter_map(|c| match c {
          Component::Normal(part) => Some(part.to_string_lossy()),
          _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

      if name.is_empty() {
        continue;
      }
      if !written.insert(name.clone()) {
        debug!(path = %entry.path().display(), name = %name, "skipping duplicate archive entry");
        continue;
      }

      if entry.file_type().is_dir() {
        zip.add_directory(name, options).map_err(zip_err)?;
      } else if entry.file_type().is_file() {
        zip.start_file(name, options).map_err(zip_err)?;
        let mut src = fs::File::open(entry.path()).map_err(|source| ArchiveError::Io {
          path: entry.path().to_path_buf(),
          source,
        })?;
        io::copy(&mut src, &mut zip).map_err(|source| ArchiveError::Io {
          path: entry.path().to_path_buf(),
          source,
        })?;
      }
    }
  }

  zip.finish().map_err(zip_err)?;
  Ok(())
}

/// Record the inputs as a declarative archive instead of building it.
///
/// Reuses the name of a recorded spec with the same input list; otherwise
/// saves a new one. No file is produced.
pub fn record_archive_spec(inputs: &[String], registry: &impl SpecRegistry) -> Result<Archive, ArchiveError> {
  check_inputs(inputs)?;

  let mut spec = ArchiveUploadSpec {
    name: archive_name(None, inputs),
    include_globs: inputs.to_vec(),
  };

  if let Some(existing) = registry.find_archive(&spec)? {
    info!(name = %existing, "re-using previously recorded archive");
    spec.name = existing;
  } else {
    registry.save_archive(&spec)?;
    info!(name = %spec.name, "recorded archive spec");
  }

  Ok(Archive::url(format!("{}{}", ARCHIVE_URL_PREFIX, spec.name), None))
}
