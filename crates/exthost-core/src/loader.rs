//! Discovery and loading of extension binaries.
//!
//! Layout of the extensions directory:
//!
//! ```text
//! extensions/
//!   libhello.so            # a single-file extension
//!   billing/
//!     libbilling.so        # the extension itself
//!     libtaxes.so          # a private dependency bundled with it
//! ```
//!
//! Top-level files with the platform's dynamic library extension are
//! candidates. In a subdirectory only the library named after the directory
//! is a candidate; anything else in there belongs to that extension.

use std::fmt;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use exthost_contract::{Extension, ExtensionBox};

use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result, panic_message};
use crate::isolation::IsolationContext;

/// Where a loaded extension came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Statically linked into the host.
    Builtin,
    /// Loaded from a binary at this path.
    Library(PathBuf),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Builtin => f.write_str("builtin"),
            Origin::Library(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An extension instance together with everything needed to keep it valid.
pub struct LoadedExtension {
    descriptor: ExtensionDescriptor,
    extension: ExtensionBox,
    origin: Origin,
    library: Option<IsolationContext>,
}

impl LoadedExtension {
    /// Wrap a statically linked extension.
    pub fn builtin(extension: ExtensionBox) -> Self {
        Self {
            descriptor: ExtensionDescriptor::capture(extension.as_ref()),
            extension,
            origin: Origin::Builtin,
            library: None,
        }
    }

    fn from_library(
        descriptor: ExtensionDescriptor,
        extension: ExtensionBox,
        library: IsolationContext,
    ) -> Self {
        Self {
            descriptor,
            extension,
            origin: Origin::Library(library.path().to_path_buf()),
            library: Some(library),
        }
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_builtin(&self) -> bool {
        self.library.is_none()
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("descriptor", &self.descriptor)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// A binary that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of [`ExtensionLoader::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded extensions, in path order.
    pub extensions: Vec<LoadedExtension>,
    pub failures: Vec<LoadFailure>,
}

/// Loads every extension binary found in one directory.
#[derive(Debug, Clone)]
pub struct ExtensionLoader {
    directory: PathBuf,
}

impl ExtensionLoader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load all candidates.
    ///
    /// Never fails as a whole: a missing directory is created and yields an
    /// empty report. A broken binary or an unreadable bundle directory is
    /// recorded in [`LoadReport::failures`] while the rest still load.
    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let Discovery {
            candidates,
            failures,
        } = match self.discover() {
            Ok(discovery) => discovery,
            Err(err) => {
                tracing::error!(
                    directory = %self.directory.display(),
                    error = %err,
                    "Cannot read extensions directory"
                );
                return report;
            }
        };
        report.failures = failures;

        for path in candidates {
            match load_binary(&path) {
                Ok(Some(loaded)) => {
                    tracing::info!(
                        extension = loaded.name(),
                        version = loaded.version(),
                        path = %path.display(),
                        "Loaded extension"
                    );
                    report.extensions.push(loaded);
                }
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "No extension entry point, skipping");
                }
                Err(error) => {
                    tracing::error!(path = %path.display(), error = %error, "Failed to load extension");
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        report
    }

    /// List candidate binaries in sorted path order.
    ///
    /// Creates the directory when it does not exist. Only failing to create
    /// or list the directory itself is an error; an entry or bundle that
    /// cannot be read becomes a [`LoadFailure`] in the returned discovery.
    pub fn discover(&self) -> Result<Discovery> {
        let mut discovery = Discovery::default();
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory).map_err(|e| Error::io(&self.directory, e))?;
            tracing::info!(directory = %self.directory.display(), "Created extensions directory");
            return Ok(discovery);
        }

        let entries = fs::read_dir(&self.directory).map_err(|e| Error::io(&self.directory, e))?;
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    discovery.skip(&self.directory, Error::io(&self.directory, e));
                    continue;
                }
            };

            if path.is_dir() {
                match bundle_entry(&path) {
                    Ok(Some(main)) => discovery.candidates.push(main),
                    Ok(None) => {}
                    Err(error) => discovery.skip(&path, error),
                }
            } else if is_dynamic_library(&path) {
                discovery.candidates.push(path);
            }
        }

        discovery.candidates.sort();
        discovery.failures.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(discovery)
    }
}

/// Candidate binaries found by [`ExtensionLoader::discover`], plus the
/// entries that could not be inspected.
#[derive(Debug, Default)]
pub struct Discovery {
    pub candidates: Vec<PathBuf>,
    pub failures: Vec<LoadFailure>,
}

impl Discovery {
    fn skip(&mut self, path: &Path, error: Error) {
        tracing::error!(path = %path.display(), error = %error, "Cannot read extension entry");
        self.failures.push(LoadFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

fn load_binary(path: &Path) -> Result<Option<LoadedExtension>> {
    let library = IsolationContext::open(path)?;
    if !library.exports_factory() {
        return Ok(None);
    }
    library.verify_contract()?;

    let Some(extension) = library.create_extension()? else {
        return Ok(None);
    };

    let descriptor = catch_unwind(AssertUnwindSafe(|| {
        ExtensionDescriptor::capture(extension.as_ref())
    }))
    .map_err(|payload| Error::Construction {
        path: path.to_path_buf(),
        reason: format!("describing the extension panicked: {}", panic_message(payload.as_ref())),
    })?;

    Ok(Some(LoadedExtension::from_library(
        descriptor, extension, library,
    )))
}

fn is_dynamic_library(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}

/// The library in `dir` named after `dir` itself, with or without a `lib`
/// prefix.
fn bundle_entry(dir: &Path) -> Result<Option<PathBuf>> {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };

    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if !is_dynamic_library(&path) {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem == name || stem.strip_prefix("lib") == Some(name) {
            matches.push(path);
        }
    }

    matches.sort();
    Ok(matches.into_iter().next())
}
