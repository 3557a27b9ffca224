//! Shared utilities.
//!
//! Content hashing and name normalization used across the crate.

pub mod hash;
pub mod name;
