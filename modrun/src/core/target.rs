//! Target platform identifiers (`GOOS`/`GOARCH` pairs).

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use serde::Serialize;

/// Operating system and CPU architecture a build is produced for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Parses the `os/arch` form used by CI platform matrices (e.g. `linux/ppc64le`).
impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (os, arch) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("platform {s:?} must have the form os/arch"))?;
        if os.is_empty() || arch.is_empty() || arch.contains('/') {
            bail!("platform {s:?} must have the form os/arch");
        }
        Ok(Self::new(os, arch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_os_arch_pair() {
        let target: Target = "linux/ppc64le".parse().expect("parse");
        assert_eq!(target, Target::new("linux", "ppc64le"));
        assert_eq!(target.to_string(), "linux/ppc64le");
    }

    #[test]
    fn rejects_malformed_platforms() {
        for raw in ["linux", "/amd64", "linux/", "linux/arm/v7", ""] {
            assert!(raw.parse::<Target>().is_err(), "{raw:?} should not parse");
        }
    }
}
