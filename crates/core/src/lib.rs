//! layerscan-core
//!
//! Core library for building software inventories out of container image layers.
//!
//! This crate defines the inventory model, the layer file tree abstraction, the
//! scanner capability traits that compose into ecosystems, and the Go ecosystem
//! that reads build metadata embedded in compiled executables.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends (the `layerscan` CLI today).

pub mod config;
pub mod layer;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
