//! Error kinds surfaced by discovery and per-module steps.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A directory could not be read during discovery. Fatal for the whole run.
#[derive(Debug, Error)]
#[error("read directory {}: {source}", .path.display())]
pub struct FilesystemError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FilesystemError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

impl From<walkdir::Error> for FilesystemError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let source = match err.into_io_error() {
            Some(io_err) => io_err,
            None => io::Error::other("filesystem loop detected"),
        };
        Self { path, source }
    }
}

/// A per-module failure. Recorded against the module; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleError {
    #[error("download {}: {cause}", .module.display())]
    DependencyFetch { module: PathBuf, cause: String },
    #[error("test {}: {cause}", .module.display())]
    TestRun { module: PathBuf, cause: String },
}

impl ModuleError {
    pub fn module(&self) -> &std::path::Path {
        match self {
            ModuleError::DependencyFetch { module, .. } | ModuleError::TestRun { module, .. } => {
                module
            }
        }
    }
}
