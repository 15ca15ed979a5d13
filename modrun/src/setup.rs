//! Cross-compilation environment setup for a CI job.
//!
//! Exports the Go target and cache variables for later steps, installs the
//! cross compiler and QEMU user emulation, and fetches the race detector
//! runtime that prebuilt Go releases lack for non-host architectures.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::cross::CrossToolchain;
use crate::core::race::race_supported;
use crate::core::syso::{RaceRuntime, resolve_runtime_ref};
use crate::core::target::Target;
use crate::io::actions::{Reporter, group};
use crate::io::apt::PackageInstaller;
use crate::io::download::Fetcher;
use crate::io::toolchain::Toolchain;

/// What `setup-env` should do for one target.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub target: Target,
    pub install_packages: bool,
    pub download_race_runtime: bool,
}

/// Variables describing the target build, in export order.
pub fn target_exports(target: &Target, cross: Option<&CrossToolchain>) -> Vec<(String, String)> {
    let race = race_supported(&target.os, &target.arch);
    let goflags = if race {
        "-race -trimpath -mod=readonly"
    } else {
        "-trimpath -mod=readonly"
    };

    let mut exports = vec![
        ("GOOS".to_string(), target.os.clone()),
        ("GOARCH".to_string(), target.arch.clone()),
        ("GOFLAGS".to_string(), goflags.to_string()),
    ];
    // -race needs cgo, and cgo must be enabled explicitly when cross compiling.
    if race || cross.is_some() {
        exports.push(("CGO_ENABLED".to_string(), "1".to_string()));
    }
    if let Some(cross) = cross {
        exports.push(("CC".to_string(), cross.cc()));
    }
    exports
}

/// Module cache location. `GOMODCACHE` only exists from Go 1.15 on; older
/// toolchains keep modules under `$GOPATH/pkg/mod`.
pub fn module_cache_dir(toolchain: &dyn Toolchain, release_tags: &[String]) -> Result<PathBuf> {
    if release_tags.iter().any(|tag| tag == "go1.15") {
        let [modcache] = env_values(toolchain, ["GOMODCACHE"])?;
        return Ok(PathBuf::from(modcache));
    }
    let [gopath] = env_values(toolchain, ["GOPATH"])?;
    Ok(Path::new(&gopath).join("pkg").join("mod"))
}

#[instrument(skip_all, fields(target = %request.target))]
pub fn setup_env(
    toolchain: &dyn Toolchain,
    reporter: &dyn Reporter,
    installer: &dyn PackageInstaller,
    fetcher: &dyn Fetcher,
    request: &SetupRequest,
) -> Result<()> {
    let target = &request.target;
    let release_tags = toolchain.release_tags().context("query release tags")?;
    debug!(tags = release_tags.len(), "release tags");
    let cross = CrossToolchain::for_target(target);

    for (name, value) in target_exports(target, cross.as_ref()) {
        reporter.export_variable(&name, &value)?;
    }
    // Later queries run in the environment the job's next steps will see.
    let targeted = toolchain.with_overrides(&reporter.exported());
    let toolchain = targeted.as_ref();

    let [build_cache] = env_values(toolchain, ["GOCACHE"])?;
    let mod_cache = module_cache_dir(toolchain, &release_tags)?;
    reporter.export_variable("GOCACHE", &build_cache)?;
    reporter.export_variable("GOMODCACHE", &mod_cache.to_string_lossy())?;

    let Some(cross) = cross else {
        info!("target needs no cross toolchain");
        return Ok(());
    };

    if request.install_packages {
        let _group = group(reporter, "Run apt install");
        installer
            .install(&cross.packages())
            .context("install cross toolchain")?;
    }

    reporter.export_variable("QEMU_LD_PREFIX", &cross.qemu_ld_prefix())?;

    if request.download_race_runtime && race_supported(&target.os, &target.arch) {
        let _group = group(reporter, "Download race detector runtime");
        let result = install_race_runtime(toolchain, reporter, fetcher, target, &release_tags);
        if let Err(err) = result {
            reporter.set_failed(&format!("download race runtime: {err:#}"));
        }
    }
    Ok(())
}

fn install_race_runtime(
    toolchain: &dyn Toolchain,
    reporter: &dyn Reporter,
    fetcher: &dyn Fetcher,
    target: &Target,
    release_tags: &[String],
) -> Result<()> {
    let version = toolchain.version().context("query go version")?;
    let git_ref = resolve_runtime_ref(release_tags, target, &version)
        .context("cannot determine Go source ref for the race runtime")?;
    let [goroot] = env_values(toolchain, ["GOROOT"])?;

    let runtime = RaceRuntime::new(target, &git_ref);
    let dest = runtime.destination(Path::new(&goroot));
    reporter.info(&format!(
        "Downloading {} to {} from {}",
        runtime.file_name,
        dest.display(),
        runtime.url
    ));
    fetcher.fetch(&runtime.url, &dest)
}

fn env_values<const N: usize>(toolchain: &dyn Toolchain, keys: [&str; N]) -> Result<[String; N]> {
    let values = toolchain
        .env(&keys)
        .with_context(|| format!("go env {}", keys.join(" ")))?;
    let count = values.len();
    values
        .try_into()
        .map_err(|_| anyhow!("go env returned {count} values, expected {N}"))
}
