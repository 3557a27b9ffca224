//! Object name generation.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::consts::MAX_NAME_LEN;

/// Normalize an arbitrary string into a valid object name.
///
/// Lowercases, replaces anything outside `[-a-z0-9]` with `-`, strips leading
/// non-letters and trailing non-alphanumerics, and truncates. An input that
/// normalizes to nothing becomes `"default"`.
pub fn kubify_name(raw: &str) -> String {
  let replaced: String = raw
    .to_lowercase()
    .chars()
    .map(|c| {
      if c == '-' || c.is_ascii_lowercase() || c.is_ascii_digit() {
        c
      } else {
        '-'
      }
    })
    .collect();

  let trimmed = replaced
    .trim_start_matches(|c: char| !c.is_ascii_lowercase())
    .trim_end_matches(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()));

  let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
  if name.is_empty() {
    name = "default".to_string();
  }
  name
}

/// Random lowercase alphanumeric string of the given length.
///
/// Used only to avoid name collisions; carries no identity.
pub fn random_suffix(len: usize) -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(len)
    .map(|b| char::from(b).to_ascii_lowercase())
    .collect()
}
