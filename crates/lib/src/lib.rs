//! fnpkg-lib: packaging and build lifecycle for function packages
//!
//! This crate provides the pieces a client needs to manage packages on a
//! function platform:
//! - `archive`: turning files, globs and URLs into archives, and moving them
//!   to and from the blob store
//! - `package`: the package record lifecycle (create, update, rebuild,
//!   delete, orphan sweep) and keeping referencing functions in sync
//! - `control`: the control-plane store the records live in
//! - `spec`: the declarative registry used instead of the remote store in
//!   spec mode

pub mod archive;
pub mod config;
pub mod consts;
pub mod control;
pub mod package;
pub mod spec;
pub mod types;
pub mod util;
