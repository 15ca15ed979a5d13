//! Orchestrator configuration stored in `modrun.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::exclusion::{DEFAULT_MANIFEST, DiscoveryRules};
use crate::core::options::TestOptions;

/// Default config file name, looked up in the run root.
pub const CONFIG_FILE_NAME: &str = "modrun.toml";

/// Orchestrator configuration (TOML).
///
/// Missing fields take the values the CI job has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModrunConfig {
    /// Executable invoked for toolchain commands.
    pub toolchain: String,

    /// File name marking a module root.
    pub manifest: String,

    /// Coverage profile written inside each module directory.
    pub coverage_profile: String,

    /// Pass `-trimpath` to `go test`.
    pub trimpath: bool,

    /// Pass `-mod=readonly` to `go test`.
    pub mod_readonly: bool,

    /// Allow `-race` on eligible targets.
    pub race: bool,

    /// Timeout for toolchain queries (`go env`, `go list`, `go version`).
    pub query_timeout_secs: u64,

    /// Timeout for downloading the race detector runtime.
    pub download_timeout_secs: u64,

    /// Appended to every `go test` invocation before the package pattern.
    pub extra_test_args: Vec<String>,
}

impl Default for ModrunConfig {
    fn default() -> Self {
        Self {
            toolchain: "go".to_string(),
            manifest: DEFAULT_MANIFEST.to_string(),
            coverage_profile: "coverage.txt".to_string(),
            trimpath: true,
            mod_readonly: true,
            race: true,
            query_timeout_secs: 60,
            download_timeout_secs: 5 * 60,
            extra_test_args: Vec::new(),
        }
    }
}

impl ModrunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.toolchain.trim().is_empty() {
            return Err(anyhow!("toolchain must be non-empty"));
        }
        if self.manifest.trim().is_empty() || self.manifest.contains(['/', '\\']) {
            return Err(anyhow!("manifest must be a plain file name"));
        }
        if self.coverage_profile.trim().is_empty() {
            return Err(anyhow!("coverage_profile must be non-empty"));
        }
        if self.query_timeout_secs == 0 {
            return Err(anyhow!("query_timeout_secs must be > 0"));
        }
        if self.download_timeout_secs == 0 {
            return Err(anyhow!("download_timeout_secs must be > 0"));
        }
        if self.extra_test_args.iter().any(|arg| arg.trim().is_empty()) {
            return Err(anyhow!("extra_test_args must not contain empty arguments"));
        }
        Ok(())
    }

    pub fn discovery_rules(&self) -> DiscoveryRules {
        DiscoveryRules::new(&self.manifest)
    }

    /// Test options before race eligibility is applied.
    pub fn test_options(&self) -> TestOptions {
        TestOptions {
            race_detection: false,
            coverage_profile: self.coverage_profile.clone(),
            reproducible_build_paths: self.trimpath,
            mod_readonly: self.mod_readonly,
            strip_cgo: false,
            extra_args: self.extra_test_args.clone(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ModrunConfig::default()`.
pub fn load_config(path: &Path) -> Result<ModrunConfig> {
    if !path.exists() {
        let cfg = ModrunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ModrunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ModrunConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "race = false\nextra_test_args = [\"-count=1\"]\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(!cfg.race);
        assert_eq!(cfg.extra_test_args, vec!["-count=1"]);
        assert_eq!(cfg.manifest, "go.mod");
        assert_eq!(cfg.toolchain, "go");
    }

    #[test]
    fn rejects_manifest_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "manifest = \"sub/go.mod\"\n").expect("write");
        let err = load_config(&path).expect_err("invalid manifest");
        assert!(format!("{err:#}").contains("manifest"));
    }

    #[test]
    fn rejects_unknown_syntax() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "race = \"sometimes\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_options_follow_config() {
        let cfg = ModrunConfig {
            trimpath: false,
            coverage_profile: "cover.out".to_string(),
            ..ModrunConfig::default()
        };
        let options = cfg.test_options();
        assert!(!options.reproducible_build_paths);
        assert!(options.mod_readonly);
        assert_eq!(options.coverage_profile, "cover.out");
        assert!(!options.race_detection);
    }
}
