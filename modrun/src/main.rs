//! Multi-module test orchestrator and CI environment setup.
//!
//! `modrun test` walks a repository for Go modules, downloads each module's
//! dependencies and runs its tests with coverage, reporting every failing
//! module without stopping at the first one.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use modrun::cli::{self, SetupArgs, TestArgs};
use modrun::core::target::Target;
use modrun::exit_codes;
use modrun::io::actions::{ReporterKind, reporter_for};
use modrun::logging;

#[derive(Parser)]
#[command(
    name = "modrun",
    version,
    about = "Test every Go module in a repository and prepare cross-compilation CI jobs"
)]
struct Cli {
    /// How job output (groups, failures, exported variables) is rendered.
    #[arg(long, value_enum, global = true, default_value_t = ReporterKind::Auto)]
    reporter: ReporterKind,

    /// Config file (default: `<root>/modrun.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print module directories in discovery order.
    Discover {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Download dependencies and run tests with coverage in every module.
    Test {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Target OS (default: `go env GOOS`).
        #[arg(long, requires = "goarch")]
        goos: Option<String>,
        /// Target architecture (default: `go env GOARCH`).
        #[arg(long, requires = "goos")]
        goarch: Option<String>,
        /// Never pass `-race`, even on eligible targets.
        #[arg(long)]
        no_race: bool,
        /// Coverage profile written in each module directory.
        #[arg(long)]
        coverage_profile: Option<String>,
        /// Write the run report as JSON to this file.
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Export cross-compilation variables, install cross tools, fetch the race runtime.
    SetupEnv {
        /// Target as `os/arch`, e.g. `linux/ppc64le`.
        #[arg(long, env = "platform")]
        platform: Target,
        /// Do not run apt-get.
        #[arg(long)]
        skip_install: bool,
        /// Do not download the race detector runtime.
        #[arg(long)]
        skip_race_runtime: bool,
    },
    /// Print whether the race detector supports a target.
    Race {
        #[arg(long)]
        goos: String,
        #[arg(long)]
        goarch: String,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Discover { root } => cli::discover(&root, cli.config.as_deref()),
        Command::Test {
            root,
            goos,
            goarch,
            no_race,
            coverage_profile,
            json,
        } => {
            let reporter = reporter_for(cli.reporter);
            let args = TestArgs {
                root,
                config: cli.config,
                target: goos.zip(goarch).map(|(os, arch)| Target::new(os, arch)),
                no_race,
                coverage_profile,
                json,
            };
            cli::test(&args, reporter.as_ref())
        }
        Command::SetupEnv {
            platform,
            skip_install,
            skip_race_runtime,
        } => {
            let reporter = reporter_for(cli.reporter);
            let args = SetupArgs {
                platform,
                config: cli.config,
                skip_install,
                skip_race_runtime,
            };
            cli::setup(&args, reporter.as_ref())
        }
        Command::Race { goos, goarch } => Ok(cli::race(&Target::new(goos, goarch))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_test_defaults() {
        let cli = Cli::parse_from(["modrun", "test"]);
        assert_eq!(cli.reporter, ReporterKind::Auto);
        match cli.command {
            Command::Test {
                root,
                goos,
                no_race,
                json,
                ..
            } => {
                assert_eq!(root, PathBuf::from("."));
                assert!(goos.is_none());
                assert!(!no_race);
                assert!(json.is_none());
            }
            _ => panic!("expected test command"),
        }
    }

    #[test]
    fn json_takes_a_report_path() {
        let cli = Cli::parse_from(["modrun", "test", "--json", "report.json", "repo"]);
        match cli.command {
            Command::Test { root, json, .. } => {
                assert_eq!(root, PathBuf::from("repo"));
                assert_eq!(json, Some(PathBuf::from("report.json")));
            }
            _ => panic!("expected test command"),
        }
    }

    #[test]
    fn goos_requires_goarch() {
        assert!(Cli::try_parse_from(["modrun", "test", "--goos", "linux"]).is_err());
        assert!(
            Cli::try_parse_from(["modrun", "test", "--goos", "linux", "--goarch", "amd64"]).is_ok()
        );
    }

    #[test]
    fn parse_setup_env_platform() {
        let cli = Cli::parse_from([
            "modrun",
            "--reporter",
            "github",
            "setup-env",
            "--platform",
            "linux/ppc64le",
            "--skip-install",
        ]);
        assert_eq!(cli.reporter, ReporterKind::Github);
        match cli.command {
            Command::SetupEnv {
                platform,
                skip_install,
                skip_race_runtime,
            } => {
                assert_eq!(platform, Target::new("linux", "ppc64le"));
                assert!(skip_install);
                assert!(!skip_race_runtime);
            }
            _ => panic!("expected setup-env command"),
        }
    }

    #[test]
    fn rejects_malformed_platform() {
        assert!(Cli::try_parse_from(["modrun", "setup-env", "--platform", "linux"]).is_err());
    }
}
