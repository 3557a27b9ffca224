//! Integration tests for fnpkg-lib.

mod common;
mod lifecycle_tests;
mod orphan_tests;
mod roundtrip_tests;
mod spec_mode_tests;
