//! Multi-module test orchestration.
//!
//! Discovery failures abort the run. Everything after discovery is
//! per-module: a module whose dependencies fail to download is not tested,
//! a module whose tests fail is recorded, and the loop always moves on to the
//! next module. Modules are processed one at a time, in discovery order.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::core::exclusion::DiscoveryRules;
use crate::core::options::TestOptions;
use crate::core::race::race_decision;
use crate::core::target::Target;
use crate::core::types::{Module, ModuleOutcome, RunReport};
use crate::error::{FilesystemError, ModuleError};
use crate::io::actions::{Reporter, group};
use crate::io::discover::discover_modules;
use crate::io::toolchain::Toolchain;

/// Inputs for one orchestration pass.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rules: DiscoveryRules,
    pub options: TestOptions,
}

/// Apply race eligibility for `target` to config-derived options.
pub fn resolve_test_options(
    mut options: TestOptions,
    target: &Target,
    race_allowed: bool,
    emulated: bool,
) -> TestOptions {
    let decision = race_decision(target, race_allowed, emulated);
    options.race_detection = decision.is_enabled();
    options.strip_cgo = decision.strips_cgo();
    options
}

pub fn fetch_dependencies(toolchain: &dyn Toolchain, module: &Module) -> Result<(), ModuleError> {
    toolchain
        .download_dependencies(module)
        .map_err(|err| ModuleError::DependencyFetch {
            module: module.path().to_path_buf(),
            cause: format!("{err:#}"),
        })
}

pub fn run_tests(
    toolchain: &dyn Toolchain,
    module: &Module,
    options: &TestOptions,
) -> Result<(), ModuleError> {
    toolchain
        .run_tests(module, options)
        .map_err(|err| ModuleError::TestRun {
            module: module.path().to_path_buf(),
            cause: format!("{err:#}"),
        })
}

/// Fetch then test one module. Tests are skipped if the fetch failed.
pub fn run_module(
    toolchain: &dyn Toolchain,
    module: &Module,
    options: &TestOptions,
) -> ModuleOutcome {
    let result =
        fetch_dependencies(toolchain, module).and_then(|()| run_tests(toolchain, module, options));
    match result {
        Ok(()) => ModuleOutcome::passed(module),
        Err(err) => ModuleOutcome::failed(module, err),
    }
}

/// Discover modules under `root` and test each of them.
///
/// Only a discovery failure is returned as an error. Module failures are
/// reported through `reporter` as they happen and collected in the report.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_all(
    root: &Path,
    config: &RunConfig,
    toolchain: &dyn Toolchain,
    reporter: &dyn Reporter,
) -> Result<RunReport, FilesystemError> {
    {
        let _group = group(reporter, "Run go env");
        if let Err(err) = toolchain.print_env() {
            let message = format!("{err:#}");
            warn!(err = %message, "could not print toolchain environment");
        }
    }

    let modules = {
        let _group = group(reporter, "Discover modules");
        let modules = discover_modules(root, &config.rules)?;
        for module in &modules {
            reporter.info(&module.path().display().to_string());
        }
        modules
    };
    info!(
        count = modules.len(),
        race = config.options.race_detection,
        "modules discovered"
    );

    let mut report = RunReport::default();
    for module in &modules {
        let _group = group(reporter, &format!("Test {}", module.path().display()));
        let outcome = run_module(toolchain, module, &config.options);
        if let Some(err) = &outcome.error {
            warn!(module = %module.path().display(), err = %err, "module failed");
            reporter.set_failed(&err.to_string());
        }
        report.push(outcome);
    }

    info!(
        modules = report.outcomes.len(),
        passed = report.passed_count(),
        failed = report.failed(),
        "run finished"
    );
    Ok(report)
}

/// One line per module for the end-of-job summary.
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.error {
            None => format!("ok    {}", outcome.module.display()),
            Some(ModuleError::DependencyFetch { .. }) => {
                format!("FAIL  {} (dependencies)", outcome.module.display())
            }
            Some(ModuleError::TestRun { .. }) => {
                format!("FAIL  {} (tests)", outcome.module.display())
            }
        })
        .collect();
    lines.push(format!(
        "{} modules, {} passed, {} failed",
        report.outcomes.len(),
        report.passed_count(),
        report.outcomes.len() - report.passed_count()
    ));
    lines
}
