//! Flags controlling a module's test invocation.

/// Package pattern matching every package under the module root.
pub const ALL_PACKAGES: &str = "./...";

/// Options for `go test` in every module of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOptions {
    /// Pass `-race`. Callers resolve eligibility first (see [`crate::core::race`]).
    pub race_detection: bool,
    /// Coverage profile path, relative to the module directory.
    pub coverage_profile: String,
    /// Strip absolute build paths from artifacts (`-trimpath`).
    pub reproducible_build_paths: bool,
    /// Refuse to update `go.mod` during the run (`-mod=readonly`).
    pub mod_readonly: bool,
    /// Remove `CGO_ENABLED` from the test environment.
    pub strip_cgo: bool,
    pub extra_args: Vec<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            race_detection: false,
            coverage_profile: "coverage.txt".to_string(),
            reproducible_build_paths: true,
            mod_readonly: true,
            strip_cgo: false,
            extra_args: Vec::new(),
        }
    }
}

impl TestOptions {
    /// Arguments following `go test`, ending with the package pattern.
    pub fn test_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.reproducible_build_paths {
            args.push("-trimpath".to_string());
        }
        if self.mod_readonly {
            args.push("-mod=readonly".to_string());
        }
        args.push(format!("-coverprofile={}", self.coverage_profile));
        if self.race_detection {
            args.push("-race".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(ALL_PACKAGES.to_string());
        args
    }
}
