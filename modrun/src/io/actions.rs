//! CI reporting: log groups, failure annotations and exported variables.
//!
//! Failures are recorded and reported, never raised; the caller decides the
//! exit status from [`Reporter::failed`] at the end of the job. Exported
//! variables are kept in-process too, so later child processes of the same
//! job see them without mutating our own environment.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tracing::warn;

pub trait Reporter {
    fn start_group(&self, name: &str);
    fn end_group(&self);
    fn info(&self, message: &str);
    /// Mark the job failed and annotate why. Work continues.
    fn set_failed(&self, message: &str);
    fn export_variable(&self, name: &str, value: &str) -> Result<()>;
    /// Everything exported so far in this process.
    fn exported(&self) -> BTreeMap<String, String>;
    fn failed(&self) -> bool;
}

/// A log group that closes when dropped, on every exit path.
#[must_use = "the group closes as soon as this guard is dropped"]
pub struct Group<'a> {
    reporter: &'a dyn Reporter,
}

impl Drop for Group<'_> {
    fn drop(&mut self) {
        self.reporter.end_group();
    }
}

pub fn group<'a>(reporter: &'a dyn Reporter, name: &str) -> Group<'a> {
    reporter.start_group(name);
    Group { reporter }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterKind {
    /// GitHub workflow commands when `GITHUB_ACTIONS=true`, console otherwise.
    Auto,
    Github,
    Console,
}

pub fn reporter_for(kind: ReporterKind) -> Box<dyn Reporter> {
    let on_actions = std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true");
    match kind {
        ReporterKind::Github => Box::new(GithubActions::from_env()),
        ReporterKind::Auto if on_actions => Box::new(GithubActions::from_env()),
        ReporterKind::Auto | ReporterKind::Console => Box::new(Console::default()),
    }
}

#[derive(Debug, Default)]
struct JobState {
    failed: Cell<bool>,
    exports: RefCell<BTreeMap<String, String>>,
}

impl JobState {
    fn record_export(&self, name: &str, value: &str) -> Result<()> {
        validate_variable_name(name)?;
        self.exports
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// GitHub Actions workflow commands on stdout; exports appended to `GITHUB_ENV`.
#[derive(Debug, Default)]
pub struct GithubActions {
    env_file: Option<PathBuf>,
    state: JobState,
}

impl GithubActions {
    pub fn new(env_file: Option<PathBuf>) -> Self {
        Self {
            env_file,
            state: JobState::default(),
        }
    }

    pub fn from_env() -> Self {
        let env_file = std::env::var_os("GITHUB_ENV")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(env_file)
    }

    fn command(&self, line: String) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            warn!(err = %e, "failed to write workflow command");
        }
    }
}

impl Reporter for GithubActions {
    fn start_group(&self, name: &str) {
        self.command(format!("::group::{}", escape_data(name)));
    }

    fn end_group(&self) {
        self.command("::endgroup::".to_string());
    }

    fn info(&self, message: &str) {
        self.command(message.to_string());
    }

    fn set_failed(&self, message: &str) {
        self.state.failed.set(true);
        self.command(format!("::error::{}", escape_data(message)));
    }

    fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        self.state.record_export(name, value)?;
        let Some(path) = &self.env_file else {
            warn!(name, "GITHUB_ENV is not set; variable only applies to this process");
            return Ok(());
        };
        let entry = env_file_entry(name, value)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(entry.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;
        Ok(())
    }

    fn exported(&self) -> BTreeMap<String, String> {
        self.state.exports.borrow().clone()
    }

    fn failed(&self) -> bool {
        self.state.failed.get()
    }
}

/// Plain output for local runs. Exports are printed as `export` lines on
/// stdout so the caller can `eval` them.
#[derive(Debug, Default)]
pub struct Console {
    state: JobState,
}

impl Reporter for Console {
    fn start_group(&self, name: &str) {
        eprintln!("==> {name}");
    }

    fn end_group(&self) {}

    fn info(&self, message: &str) {
        eprintln!("{message}");
    }

    fn set_failed(&self, message: &str) {
        self.state.failed.set(true);
        eprintln!("error: {message}");
    }

    fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        self.state.record_export(name, value)?;
        println!("export {name}={}", shell_quote(value));
        Ok(())
    }

    fn exported(&self) -> BTreeMap<String, String> {
        self.state.exports.borrow().clone()
    }

    fn failed(&self) -> bool {
        self.state.failed.get()
    }
}

fn validate_variable_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid environment variable name {name:?}");
    }
    Ok(())
}

/// Escape `%`, CR and LF in workflow command data.
fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// One `GITHUB_ENV` entry; multi-line values use the heredoc form.
fn env_file_entry(name: &str, value: &str) -> Result<String> {
    if !value.contains('\n') && !value.contains('\r') {
        return Ok(format!("{name}={value}\n"));
    }
    let delimiter = format!("MODRUN_EOF_{}", std::process::id());
    if value.contains(&delimiter) {
        bail!("value of {name} contains the heredoc delimiter {delimiter}");
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
