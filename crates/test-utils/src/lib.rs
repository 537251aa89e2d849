//! Shared test fixtures for the staging workspace.
//!
//! Provides synthetic georeferenced tiles, archive-style filename
//! generators and small data-file builders so crates can exercise the
//! discovery/index/filter pipeline without real archives.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod geotiff;

pub use fixtures::*;
pub use geotiff::*;
