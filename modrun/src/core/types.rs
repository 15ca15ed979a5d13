//! Module descriptors and run outcomes.
//!
//! Outcomes are recorded in discovery order and never dropped; a failed
//! module never hides the results of modules after it.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ModuleError;

/// A directory holding a manifest file. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    path: PathBuf,
}

impl Module {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of processing one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleOutcome {
    pub module: PathBuf,
    /// `None` when dependencies resolved and tests passed.
    pub error: Option<ModuleError>,
}

impl ModuleOutcome {
    pub fn passed(module: &Module) -> Self {
        Self {
            module: module.path().to_path_buf(),
            error: None,
        }
    }

    pub fn failed(module: &Module, error: ModuleError) -> Self {
        Self {
            module: module.path().to_path_buf(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered per-module outcomes of one orchestration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ModuleOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: ModuleOutcome) {
        self.outcomes.push(outcome);
    }

    /// The run failed iff at least one module failed.
    pub fn failed(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ModuleError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.error.as_ref())
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .count()
    }
}
