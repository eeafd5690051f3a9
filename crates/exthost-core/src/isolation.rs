//! Per-binary isolation contexts.
//!
//! Each extension binary is opened as its own library with a private symbol
//! namespace. Its dependent libraries resolve from its own directory before
//! anything the host or another extension already loaded. The contract
//! types are never read from the binary: only two plain entry points are
//! looked up, and the contract version the binary reports is checked
//! against the host's before the factory is called.

use std::ffi::CStr;
use std::fmt;
use std::path::{Path, PathBuf};

use exthost_contract::{
    CONTRACT_VERSION, CONTRACT_VERSION_SYMBOL, CREATE_EXTENSION_SYMBOL, ContractVersionFn,
    CreateExtensionFn, ExtensionBox,
};
use libloading::Library;

use crate::error::{Error, Result};

/// An opened extension binary.
///
/// Keyed by the binary's path. Opened libraries are never closed, whether or
/// not their extension survives resolution: route handlers, runtime tasks
/// and thread-locals may still point into the library's code after every
/// instance it produced has been dropped.
pub struct IsolationContext {
    path: PathBuf,
    library: &'static Library,
}

impl IsolationContext {
    /// Open `path` in a fresh isolation context.
    pub fn open(path: &Path) -> Result<Self> {
        // SAFETY: loading a library runs its initialisers. Extension binaries
        // are trusted code placed in the extensions directory by the operator.
        let library = unsafe { open_isolated(path) }.map_err(|source| Error::LibraryOpen {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Opened extension binary");
        Ok(Self {
            path: path.to_path_buf(),
            library: Box::leak(Box::new(library)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the binary exports the extension factory.
    pub fn exports_factory(&self) -> bool {
        // SAFETY: the symbol is only looked up, not called.
        unsafe { self.library.get::<CreateExtensionFn>(CREATE_EXTENSION_SYMBOL) }.is_ok()
    }

    /// The contract version the binary was built against, if it says.
    pub fn contract_version(&self) -> Option<String> {
        // SAFETY: the symbol is generated by `export_extension!` with the
        // `ContractVersionFn` signature and returns a static NUL-terminated
        // string.
        unsafe {
            let symbol = self
                .library
                .get::<ContractVersionFn>(CONTRACT_VERSION_SYMBOL)
                .ok()?;
            let ptr = symbol();
            if ptr.is_null() {
                return None;
            }
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }

    /// Refuse the binary unless it was built against the host's contract.
    pub fn verify_contract(&self) -> Result<()> {
        match self.contract_version() {
            Some(found) if found == CONTRACT_VERSION => Ok(()),
            found => Err(Error::ContractMismatch {
                path: self.path.clone(),
                expected: CONTRACT_VERSION.to_string(),
                found: found.unwrap_or_else(|| "none".to_string()),
            }),
        }
    }

    /// Call the factory. `Ok(None)` when the binary exports no factory.
    ///
    /// Call [`verify_contract`](Self::verify_contract) first: the returned
    /// box is only meaningful if both sides agree on the trait layout.
    pub fn create_extension(&self) -> Result<Option<ExtensionBox>> {
        // SAFETY: the factory is generated by `export_extension!` and
        // returns either null or a pointer from `Box::into_raw`.
        unsafe {
            let Ok(factory) = self.library.get::<CreateExtensionFn>(CREATE_EXTENSION_SYMBOL)
            else {
                return Ok(None);
            };

            let raw = factory();
            if raw.is_null() {
                return Err(Error::Construction {
                    path: self.path.clone(),
                    reason: "factory returned no instance".to_string(),
                });
            }
            Ok(Some(*Box::from_raw(raw)))
        }
    }
}

impl fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationContext")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
unsafe fn open_isolated(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::Library as UnixLibrary;

    // RTLD_LOCAL keeps the binary's symbols out of the global namespace;
    // RTLD_DEEPBIND makes the binary prefer its own bundled libraries.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    let flags = libc::RTLD_NOW | libc::RTLD_LOCAL | libc::RTLD_DEEPBIND;
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    let flags = libc::RTLD_NOW | libc::RTLD_LOCAL;

    unsafe { UnixLibrary::open(Some(path), flags) }.map(Library::from)
}

#[cfg(windows)]
unsafe fn open_isolated(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::windows::{LOAD_WITH_ALTERED_SEARCH_PATH, Library as WindowsLibrary};

    // Dependent DLLs are searched for in the binary's own directory first.
    unsafe { WindowsLibrary::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH) }
        .map(Library::from)
}
