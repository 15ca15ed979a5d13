//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::race::race_supported;
use crate::core::target::Target;
use crate::exit_codes;
use crate::io::actions::{Reporter, group};
use crate::io::apt::AptGet;
use crate::io::config::{CONFIG_FILE_NAME, ModrunConfig, load_config};
use crate::io::discover::discover_modules;
use crate::io::download::HttpFetcher;
use crate::io::toolchain::{GoToolchain, toolchain_target};
use crate::orchestrate::{RunConfig, resolve_test_options, run_all, summary_lines};
use crate::setup::{SetupRequest, setup_env};

/// Options for `modrun test`.
#[derive(Debug, Clone)]
pub struct TestArgs {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    /// Explicit target; queried from the toolchain when `None`.
    pub target: Option<Target>,
    pub no_race: bool,
    pub coverage_profile: Option<String>,
    /// Write the run report as JSON to this file.
    pub json: Option<PathBuf>,
}

/// Options for `modrun setup-env`.
#[derive(Debug, Clone)]
pub struct SetupArgs {
    pub platform: Target,
    pub config: Option<PathBuf>,
    pub skip_install: bool,
    pub skip_race_runtime: bool,
}

fn load(root: &Path, config: Option<&Path>) -> Result<ModrunConfig> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => root.join(CONFIG_FILE_NAME),
    };
    debug!(config = %path.display(), "loading config");
    load_config(&path).context("load config")
}

fn toolchain(cfg: &ModrunConfig) -> GoToolchain {
    GoToolchain::new(&cfg.toolchain, Duration::from_secs(cfg.query_timeout_secs))
}

/// Whether tests run under QEMU user-mode emulation.
fn emulated() -> bool {
    std::env::var_os("QEMU_LD_PREFIX").is_some_and(|v| !v.is_empty())
}

/// Print discovered module directories, one per line.
pub fn discover(root: &Path, config: Option<&Path>) -> Result<i32> {
    let cfg = load(root, config)?;
    let modules = discover_modules(root, &cfg.discovery_rules())?;
    for module in modules {
        println!("{}", module.path().display());
    }
    Ok(exit_codes::OK)
}

/// Download dependencies and run tests in every module under the root.
pub fn test(args: &TestArgs, reporter: &dyn Reporter) -> Result<i32> {
    let cfg = load(&args.root, args.config.as_deref())?;
    let toolchain = toolchain(&cfg);
    let target = match &args.target {
        Some(target) => target.clone(),
        None => toolchain_target(&toolchain).context("resolve target platform")?,
    };

    let mut options = cfg.test_options();
    if let Some(profile) = &args.coverage_profile {
        options.coverage_profile = profile.clone();
    }
    let options = resolve_test_options(options, &target, cfg.race && !args.no_race, emulated());
    info!(%target, race = options.race_detection, "test options resolved");
    reporter.info(&format!(
        "target {target}, race detector {}",
        if options.race_detection { "on" } else { "off" }
    ));

    let run_config = RunConfig {
        rules: cfg.discovery_rules(),
        options,
    };
    let report = run_all(&args.root, &run_config, &toolchain, reporter)?;

    {
        let _group = group(reporter, "Summary");
        for line in summary_lines(&report) {
            reporter.info(&line);
        }
    }
    if let Some(path) = &args.json {
        write_json(path, &report)?;
        debug!(path = %path.display(), "report written");
    }

    Ok(if report.failed() {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    })
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
///
/// Never stdout: it carries the toolchain's live output and workflow commands.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Prepare the cross-compilation environment for later CI steps.
pub fn setup(args: &SetupArgs, reporter: &dyn Reporter) -> Result<i32> {
    let cwd = std::env::current_dir().context("current directory")?;
    let cfg = load(&cwd, args.config.as_deref())?;
    let request = SetupRequest {
        target: args.platform.clone(),
        install_packages: !args.skip_install,
        download_race_runtime: !args.skip_race_runtime,
    };
    setup_env(
        &toolchain(&cfg),
        reporter,
        &AptGet::default(),
        &HttpFetcher::new(Duration::from_secs(cfg.download_timeout_secs)),
        &request,
    )?;
    Ok(if reporter.failed() {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    })
}

/// Print whether the race detector is available for a target.
pub fn race(target: &Target) -> i32 {
    println!("{}", race_supported(&target.os, &target.arch));
    exit_codes::OK
}
