//! Extension loading and dependency resolution for exthost.
//!
//! This crate turns a directory of extension binaries into an ordered list
//! of extensions that are safe to host:
//!
//! 1. [`ExtensionLoader`] opens each binary in its own [`IsolationContext`]
//!    and captures an [`ExtensionDescriptor`].
//! 2. [`Resolver`] builds a [`DependencyGraph`], sorts it, validates declared
//!    requirements and custom hooks, and cascades removals.
//!
//! Every exclusion is recorded in a [`ResolutionContext`].

pub mod cascade;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod isolation;
pub mod loader;
pub mod resolver;
mod sort;
pub mod validate;
pub mod version;

pub use cascade::cascade_remove;
pub use context::{Rejection, RejectionReason, ResolutionContext, Stage};
pub use descriptor::ExtensionDescriptor;
pub use error::{Error, Result, panic_message};
pub use graph::DependencyGraph;
pub use isolation::IsolationContext;
pub use loader::{Discovery, ExtensionLoader, LoadFailure, LoadReport, LoadedExtension, Origin};
pub use resolver::Resolver;
pub use validate::{ValidSet, validate_custom, validate_declared};
pub use version::{ConstraintError, VersionRequirement, check_requirement};
