//! Test-only helpers: fixture module trees and scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::exclusion::DEFAULT_MANIFEST;
use crate::core::options::TestOptions;
use crate::core::types::Module;
use crate::io::actions::Reporter;
use crate::io::apt::PackageInstaller;
use crate::io::download::Fetcher;
use crate::io::toolchain::Toolchain;

/// Temporary directory tree for discovery tests.
pub struct FixtureTree {
    dir: TempDir,
    root: PathBuf,
}

impl Default for FixtureTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonicalize tempdir");
        Self { dir, root }
    }

    /// Root as created (not canonicalized).
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Canonical absolute path of `rel`, as discovery reports it.
    pub fn abs(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.abs(rel);
        fs::create_dir_all(&path).expect("create fixture dir");
        path
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        let path = self.abs(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture parent");
        }
        fs::write(&path, "").expect("write fixture file");
        path
    }

    /// Create a module directory with a manifest (`""` is the root).
    pub fn module(&self, rel: &str) -> PathBuf {
        let dir = self.dir(rel);
        fs::write(dir.join(DEFAULT_MANIFEST), "module example.com/fixture\n")
            .expect("write manifest");
        dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainCall {
    PrintEnv,
    Download(PathBuf),
    Test(PathBuf),
}

/// In-memory [`Toolchain`] with scripted answers and failures.
#[derive(Debug, Default)]
pub struct ScriptedToolchain {
    env: BTreeMap<String, String>,
    release_tags: Vec<String>,
    version: String,
    fail_print_env: bool,
    failing_downloads: BTreeSet<PathBuf>,
    failing_tests: BTreeSet<PathBuf>,
    calls: RefCell<Vec<ToolchainCall>>,
    test_options: RefCell<Vec<TestOptions>>,
    env_queries: RefCell<Vec<EnvQuery>>,
}

/// One `env` lookup and the overrides that were in effect for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvQuery {
    pub keys: Vec<String>,
    pub overrides: BTreeMap<String, String>,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_value(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_release_tags(mut self, tags: &[&str]) -> Self {
        self.release_tags = tags.iter().map(|tag| tag.to_string()).collect();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn failing_print_env(mut self) -> Self {
        self.fail_print_env = true;
        self
    }

    pub fn failing_download(mut self, module: impl Into<PathBuf>) -> Self {
        self.failing_downloads.insert(module.into());
        self
    }

    pub fn failing_tests(mut self, module: impl Into<PathBuf>) -> Self {
        self.failing_tests.insert(module.into());
        self
    }

    pub fn calls(&self) -> Vec<ToolchainCall> {
        self.calls.borrow().clone()
    }

    /// Options passed to each `run_tests` call, in order.
    pub fn test_options(&self) -> Vec<TestOptions> {
        self.test_options.borrow().clone()
    }

    pub fn env_queries(&self) -> Vec<EnvQuery> {
        self.env_queries.borrow().clone()
    }

    fn lookup(&self, keys: &[&str], overrides: &BTreeMap<String, String>) -> Vec<String> {
        self.env_queries.borrow_mut().push(EnvQuery {
            keys: keys.iter().map(|key| key.to_string()).collect(),
            overrides: overrides.clone(),
        });
        keys.iter()
            .map(|key| {
                overrides
                    .get(*key)
                    .or_else(|| self.env.get(*key))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl Toolchain for ScriptedToolchain {
    fn print_env(&self) -> Result<()> {
        self.calls.borrow_mut().push(ToolchainCall::PrintEnv);
        if self.fail_print_env {
            bail!("go env: exit status 1");
        }
        Ok(())
    }

    fn env(&self, keys: &[&str]) -> Result<Vec<String>> {
        Ok(self.lookup(keys, &BTreeMap::new()))
    }

    fn release_tags(&self) -> Result<Vec<String>> {
        Ok(self.release_tags.clone())
    }

    fn version(&self) -> Result<String> {
        Ok(self.version.clone())
    }

    fn download_dependencies(&self, module: &Module) -> Result<()> {
        let path = module.path().to_path_buf();
        self.calls
            .borrow_mut()
            .push(ToolchainCall::Download(path.clone()));
        if self.failing_downloads.contains(&path) {
            bail!("go mod download: exit status 1");
        }
        Ok(())
    }

    fn run_tests(&self, module: &Module, options: &TestOptions) -> Result<()> {
        let path = module.path().to_path_buf();
        self.calls.borrow_mut().push(ToolchainCall::Test(path.clone()));
        self.test_options.borrow_mut().push(options.clone());
        if self.failing_tests.contains(&path) {
            bail!("go test: exit status 1");
        }
        Ok(())
    }

    fn with_overrides<'a>(&'a self, env: &BTreeMap<String, String>) -> Box<dyn Toolchain + 'a> {
        Box::new(ScriptedOverlay {
            base: self,
            overrides: env.clone(),
        })
    }
}

/// A [`ScriptedToolchain`] seen through environment overrides. Calls are
/// recorded on the base toolchain.
struct ScriptedOverlay<'a> {
    base: &'a ScriptedToolchain,
    overrides: BTreeMap<String, String>,
}

impl Toolchain for ScriptedOverlay<'_> {
    fn print_env(&self) -> Result<()> {
        self.base.print_env()
    }

    fn env(&self, keys: &[&str]) -> Result<Vec<String>> {
        Ok(self.base.lookup(keys, &self.overrides))
    }

    fn release_tags(&self) -> Result<Vec<String>> {
        self.base.release_tags()
    }

    fn version(&self) -> Result<String> {
        self.base.version()
    }

    fn download_dependencies(&self, module: &Module) -> Result<()> {
        self.base.download_dependencies(module)
    }

    fn run_tests(&self, module: &Module, options: &TestOptions) -> Result<()> {
        self.base.run_tests(module, options)
    }

    fn with_overrides<'b>(&'b self, env: &BTreeMap<String, String>) -> Box<dyn Toolchain + 'b> {
        let mut overrides = self.overrides.clone();
        overrides.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Box::new(ScriptedOverlay {
            base: self.base,
            overrides,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    GroupStart(String),
    GroupEnd,
    Info(String),
    Failed(String),
    Export(String, String),
}

/// [`Reporter`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<ReportEvent>>,
    exports: RefCell<BTreeMap<String, String>>,
    failed: Cell<bool>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.borrow().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Failed(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::GroupStart(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every group was closed, and none were nested.
    pub fn groups_balanced(&self) -> bool {
        let mut open = false;
        let events = self.events.borrow();
        for event in &*events {
            match event {
                ReportEvent::GroupStart(_) if open => return false,
                ReportEvent::GroupStart(_) => open = true,
                ReportEvent::GroupEnd if !open => return false,
                ReportEvent::GroupEnd => open = false,
                _ => {}
            }
        }
        !open
    }
}

impl Reporter for RecordingReporter {
    fn start_group(&self, name: &str) {
        self.events
            .borrow_mut()
            .push(ReportEvent::GroupStart(name.to_string()));
    }

    fn end_group(&self) {
        self.events.borrow_mut().push(ReportEvent::GroupEnd);
    }

    fn info(&self, message: &str) {
        self.events
            .borrow_mut()
            .push(ReportEvent::Info(message.to_string()));
    }

    fn set_failed(&self, message: &str) {
        self.failed.set(true);
        self.events
            .borrow_mut()
            .push(ReportEvent::Failed(message.to_string()));
    }

    fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        self.exports
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.events
            .borrow_mut()
            .push(ReportEvent::Export(name.to_string(), value.to_string()));
        Ok(())
    }

    fn exported(&self) -> BTreeMap<String, String> {
        self.exports.borrow().clone()
    }

    fn failed(&self) -> bool {
        self.failed.get()
    }
}

/// [`PackageInstaller`] that records package lists instead of installing.
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    installed: RefCell<Vec<Vec<String>>>,
}

impl RecordingInstaller {
    pub fn installed(&self) -> Vec<Vec<String>> {
        self.installed.borrow().clone()
    }
}

impl PackageInstaller for RecordingInstaller {
    fn install(&self, packages: &[String]) -> Result<()> {
        self.installed.borrow_mut().push(packages.to_vec());
        Ok(())
    }
}

/// [`Fetcher`] that records requests and optionally fails them.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    error: Option<String>,
    fetched: RefCell<Vec<(String, PathBuf)>>,
}

impl ScriptedFetcher {
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            fetched: RefCell::default(),
        }
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        self.fetched
            .borrow_mut()
            .push((url.to_string(), dest.to_path_buf()));
        Ok(())
    }
}
