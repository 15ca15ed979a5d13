//! Go toolchain adapter.
//!
//! The orchestrator only needs a handful of capabilities from the toolchain,
//! so they sit behind [`Toolchain`] and tests substitute a scripted fake.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use super::process::{describe_command, describe_status, run_capture, run_inherited_checked};
use crate::core::options::TestOptions;
use crate::core::target::Target;
use crate::core::types::Module;

const QUERY_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

pub trait Toolchain {
    /// Print the toolchain environment (`go env`) for the job log.
    fn print_env(&self) -> Result<()>;

    /// Values of the given environment keys, in order (`go env K1 K2`).
    fn env(&self, keys: &[&str]) -> Result<Vec<String>>;

    /// Release tags the toolchain satisfies, oldest first (`go1.1` .. `go1.N`).
    fn release_tags(&self) -> Result<Vec<String>>;

    /// Raw `go version` line.
    fn version(&self) -> Result<String>;

    /// Download the module's dependencies into the shared module cache.
    fn download_dependencies(&self, module: &Module) -> Result<()>;

    /// Run all packages' tests in the module, streaming output live.
    fn run_tests(&self, module: &Module, options: &TestOptions) -> Result<()>;

    /// The same toolchain with `env` applied to every later invocation.
    fn with_overrides<'a>(&'a self, env: &BTreeMap<String, String>) -> Box<dyn Toolchain + 'a>;
}

/// Target platform as the toolchain sees it (`GOOS`/`GOARCH`).
pub fn toolchain_target(toolchain: &dyn Toolchain) -> Result<Target> {
    let values = toolchain.env(&["GOOS", "GOARCH"])?;
    match values.as_slice() {
        [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Target::new(os, arch)),
        other => bail!("unexpected go env GOOS GOARCH output: {other:?}"),
    }
}

/// `go` subprocess implementation of [`Toolchain`].
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: PathBuf,
    env: BTreeMap<String, String>,
    query_timeout: Duration,
    output_limit: usize,
}

impl GoToolchain {
    pub fn new(program: impl Into<PathBuf>, query_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            env: BTreeMap::new(),
            query_timeout,
            output_limit: QUERY_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Cap on captured query output; a query producing more stdout fails.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Add environment overrides applied to every later invocation.
    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.envs(&self.env);
        cmd
    }

    fn query(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.command();
        cmd.args(args);
        let rendered = describe_command(&cmd);
        let output = run_capture(cmd, self.query_timeout, self.output_limit)?;
        if output.timed_out {
            bail!(
                "{rendered}: timed out after {}s",
                self.query_timeout.as_secs()
            );
        }
        if !output.status.success() {
            let mut stderr = output.stderr_text().trim().to_string();
            if output.stderr_truncated > 0 {
                stderr.push_str(&format!(" [stderr truncated {} bytes]", output.stderr_truncated));
            }
            bail!("{rendered}: {}: {stderr}", describe_status(output.status));
        }
        // A cut-off answer is never parsed.
        if output.stdout_truncated > 0 {
            bail!(
                "{rendered}: output exceeded {} bytes ({} bytes dropped)",
                self.output_limit,
                output.stdout_truncated
            );
        }
        Ok(output.stdout_text())
    }
}

impl Toolchain for GoToolchain {
    fn print_env(&self) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("env");
        run_inherited_checked(cmd)
    }

    fn env(&self, keys: &[&str]) -> Result<Vec<String>> {
        let mut args = vec!["env"];
        args.extend_from_slice(keys);
        let stdout = self.query(&args)?;
        let values: Vec<String> = stdout.lines().map(|line| line.trim().to_string()).collect();
        if values.len() != keys.len() {
            bail!(
                "go env {}: expected {} values, got {}",
                keys.join(" "),
                keys.len(),
                values.len()
            );
        }
        Ok(values)
    }

    fn release_tags(&self) -> Result<Vec<String>> {
        let stdout = self.query(&[
            "list",
            "-f",
            "{{range context.ReleaseTags}}{{println .}}{{end}}",
            "runtime",
        ])?;
        Ok(parse_release_tags(&stdout))
    }

    fn version(&self) -> Result<String> {
        Ok(self.query(&["version"])?.trim().to_string())
    }

    #[instrument(skip_all, fields(module = %module.path().display()))]
    fn download_dependencies(&self, module: &Module) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["mod", "download"]).current_dir(module.path());
        debug!("downloading dependencies");
        run_inherited_checked(cmd)
    }

    #[instrument(skip_all, fields(module = %module.path().display(), race = options.race_detection))]
    fn run_tests(&self, module: &Module, options: &TestOptions) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("test")
            .args(options.test_args())
            .current_dir(module.path());
        if options.strip_cgo {
            cmd.env_remove("CGO_ENABLED");
        }
        debug!("running tests");
        run_inherited_checked(cmd)
    }

    fn with_overrides<'a>(&'a self, env: &BTreeMap<String, String>) -> Box<dyn Toolchain + 'a> {
        Box::new(self.clone().with_env(env))
    }
}

fn parse_release_tags(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedToolchain;

    #[test]
    fn release_tags_skip_blank_lines() {
        let tags = parse_release_tags("go1.1\r\ngo1.2\n\ngo1.15\n");
        assert_eq!(tags, vec!["go1.1", "go1.2", "go1.15"]);
    }

    #[test]
    fn target_comes_from_goos_goarch() {
        let toolchain = ScriptedToolchain::new()
            .with_env_value("GOOS", "linux")
            .with_env_value("GOARCH", "ppc64le");
        let target = toolchain_target(&toolchain).expect("target");
        assert_eq!(target, Target::new("linux", "ppc64le"));
    }

    #[test]
    fn missing_goos_is_an_error() {
        let toolchain = ScriptedToolchain::new().with_env_value("GOARCH", "amd64");
        assert!(toolchain_target(&toolchain).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn query_failure_includes_stderr() {
        let toolchain = GoToolchain::new("sh", Duration::from_secs(10));
        let err = toolchain
            .query(&["-c", "echo boom >&2; exit 2"])
            .expect_err("failing query");
        let message = format!("{err:#}");
        assert!(message.contains("exit status 2"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn oversized_query_output_is_rejected() {
        let toolchain = GoToolchain::new("sh", Duration::from_secs(10)).with_output_limit(16);
        let err = toolchain
            .query(&["-c", "printf 'go1.1\\ngo1.2\\ngo1.3\\ngo1.4\\ngo1.5\\n'"])
            .expect_err("truncated query");
        let message = format!("{err:#}");
        assert!(message.contains("exceeded 16 bytes"), "{message}");
        assert!(message.contains("14 bytes dropped"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_query_notes_truncated_stderr() {
        let toolchain = GoToolchain::new("sh", Duration::from_secs(10)).with_output_limit(8);
        let err = toolchain
            .query(&["-c", "printf 'module lookup failed' >&2; exit 1"])
            .expect_err("failing query");
        let message = format!("{err:#}");
        assert!(message.contains("module l"), "{message}");
        assert!(message.contains("[stderr truncated 12 bytes]"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn overrides_reach_child_environment() {
        let env = BTreeMap::from([("MODRUN_TARGET_ARCH".to_string(), "ppc64le".to_string())]);
        let toolchain = GoToolchain::new("sh", Duration::from_secs(10)).with_env(&env);
        let out = toolchain
            .query(&["-c", "printf %s \"$MODRUN_TARGET_ARCH\""])
            .expect("query");
        assert_eq!(out, "ppc64le");
    }

    #[cfg(unix)]
    #[test]
    fn overridden_toolchain_answers_env_with_exports() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("go");
        std::fs::write(&script, "#!/bin/sh\nprintf '%s\\n' \"$GOARCH\"\n").expect("write script");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");

        let base = GoToolchain::new(&script, Duration::from_secs(10));
        let exports = BTreeMap::from([("GOARCH".to_string(), "s390x".to_string())]);
        let targeted = base.with_overrides(&exports);
        assert_eq!(targeted.env(&["GOARCH"]).expect("env"), vec!["s390x"]);
    }
}
