//! Shared test utilities for the exthost workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`extension`]: [`FakeExtension`] builder with scripted hook behaviour
//! - [`host`]: [`TestHost`] temporary directory laid out like a host install

pub mod extension;
pub mod host;

pub use extension::{FakeExtension, FakeService, Validation};
pub use host::TestHost;
