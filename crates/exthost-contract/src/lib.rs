//! Host-shared extension contract for exthost.
//!
//! Every extension binary and the host link against this crate. It is the one
//! piece of code an extension never brings its own copy of: the host checks
//! the [`CONTRACT_VERSION`] an extension was built against before touching
//! any of its symbols.
//!
//! # Writing an extension
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use exthost_contract::{Extension, ExtensionConfig, ServiceCollection, export_extension};
//! use exthost_contract::axum::{Router, routing::get};
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! impl Extension for Hello {
//!     fn name(&self) -> &str { "hello" }
//!     fn version(&self) -> &str { "1.0.0" }
//!
//!     fn register_routes(
//!         &self,
//!         routes: Router,
//!         _config: &ExtensionConfig,
//!         _services: &Arc<ServiceCollection>,
//!     ) -> Router {
//!         routes.route("/", get(|| async { "hello" }))
//!     }
//! }
//!
//! export_extension!(Hello::default);
//! ```
//!
//! Extensions must be compiled with the same toolchain as the host: trait
//! objects cross the library boundary using the Rust ABI.

mod config;
mod extension;
mod services;

pub use axum;

pub use config::ExtensionConfig;
pub use extension::{Extension, ExtensionBox, HookError, LoadedVersions};
pub use services::ServiceCollection;

/// Version of this contract crate.
///
/// An extension built against any other version is refused by the loader.
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// [`CONTRACT_VERSION`] with a trailing NUL, for the exported symbol.
#[doc(hidden)]
pub const CONTRACT_VERSION_NUL: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Name of the symbol reporting the contract version an extension was built with.
pub const CONTRACT_VERSION_SYMBOL: &[u8] = b"exthost_contract_version\0";

/// Name of the symbol constructing the extension instance.
pub const CREATE_EXTENSION_SYMBOL: &[u8] = b"exthost_create_extension\0";

/// Signature of the exported contract-version function.
pub type ContractVersionFn = unsafe extern "C" fn() -> *const std::ffi::c_char;

/// Signature of the exported factory function.
///
/// Returns a null pointer when construction failed.
pub type CreateExtensionFn = unsafe extern "C" fn() -> *mut ExtensionBox;

/// Export an extension type from a `cdylib`.
///
/// Takes a path to a constructor function returning the extension value
/// (for example `MyExtension::default` or `MyExtension::new`). Generates the
/// two entry points the host looks up: the contract version and the factory.
/// A panicking constructor yields a null instance instead of unwinding across
/// the FFI boundary.
#[macro_export]
macro_rules! export_extension {
    ($ctor:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn exthost_contract_version() -> *const ::std::ffi::c_char {
            $crate::CONTRACT_VERSION_NUL.as_ptr().cast()
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn exthost_create_extension() -> *mut $crate::ExtensionBox {
            match ::std::panic::catch_unwind(|| {
                let extension: $crate::ExtensionBox = ::std::boxed::Box::new($ctor());
                extension
            }) {
                Ok(extension) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(extension)),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_version_nul_terminated() {
        assert_eq!(
            CONTRACT_VERSION_NUL.strip_suffix('\0'),
            Some(CONTRACT_VERSION)
        );
    }

    #[test]
    fn test_symbol_names_nul_terminated() {
        assert_eq!(CONTRACT_VERSION_SYMBOL.last(), Some(&0));
        assert_eq!(CREATE_EXTENSION_SYMBOL.last(), Some(&0));
    }
}
