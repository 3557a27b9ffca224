//! Package record management.
//!
//! # Build status
//!
//! - `none` / `succeeded`: no build owed
//! - `pending` / `running`: owned by the build service
//! - `failed`: stays failed until an explicit [`PackageManager::rebuild`]
//!
//! An update owes a build when the environment, build command or source
//! archive changes. A new deployment archive marks the package prebuilt
//! instead.
//!
//! # Submodules
//!
//! - [`manager`] - Create, update, rebuild, delete and sweep packages
//! - [`sync`] - Advance referencing functions to a new package revision

pub mod manager;
pub mod sync;
mod types;

pub use manager::{PackageManager, create_package_spec};
pub use types::*;
