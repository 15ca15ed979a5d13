//! OS package installation for cross-compilation targets.

use std::process::Command;

use anyhow::{Result, bail};
use tracing::{info, instrument};

use super::process::run_inherited_checked;

pub trait PackageInstaller {
    fn install(&self, packages: &[String]) -> Result<()>;
}

/// `apt-get install` via `sudo`, output streamed to the job log.
#[derive(Debug, Clone)]
pub struct AptGet {
    use_sudo: bool,
}

impl Default for AptGet {
    fn default() -> Self {
        Self { use_sudo: true }
    }
}

impl AptGet {
    pub fn without_sudo() -> Self {
        Self { use_sudo: false }
    }

    fn command(&self, packages: &[String]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("apt-get");
            cmd
        } else {
            Command::new("apt-get")
        };
        cmd.args(["install", "--no-install-recommends", "-y"])
            .args(packages);
        cmd
    }
}

impl PackageInstaller for AptGet {
    #[instrument(skip_all, fields(count = packages.len()))]
    fn install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            bail!("no packages to install");
        }
        info!(packages = %packages.join(" "), "installing packages");
        run_inherited_checked(self.command(packages))
    }
}
