//! Cross-compilation toolchains installed for non-host Linux targets.

use super::target::Target;

/// GCC cross toolchain and matching Debian/Ubuntu package names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossToolchain {
    /// GNU target triple, e.g. `powerpc64le-linux-gnu`.
    pub triple: &'static str,
    /// Debian architecture name used by `-cross` packages, e.g. `ppc64el`.
    pub debian_arch: &'static str,
}

impl CrossToolchain {
    pub fn for_target(target: &Target) -> Option<Self> {
        if target.os != "linux" {
            return None;
        }
        let (triple, debian_arch) = match target.arch.as_str() {
            "ppc64le" => ("powerpc64le-linux-gnu", "ppc64el"),
            "arm64" => ("aarch64-linux-gnu", "arm64"),
            "s390x" => ("s390x-linux-gnu", "s390x"),
            "riscv64" => ("riscv64-linux-gnu", "riscv64"),
            "arm" => ("arm-linux-gnueabihf", "armhf"),
            _ => return None,
        };
        Some(Self {
            triple,
            debian_arch,
        })
    }

    /// C compiler passed to cgo via `CC`.
    pub fn cc(&self) -> String {
        format!("{}-gcc", self.triple)
    }

    /// Sysroot QEMU uses to find the target's program loader.
    pub fn qemu_ld_prefix(&self) -> String {
        format!("/usr/{}", self.triple)
    }

    /// Packages for QEMU user emulation, the cross compiler, libc headers and
    /// the ThreadSanitizer runtime.
    pub fn packages(&self) -> Vec<String> {
        vec![
            "qemu-user".to_string(),
            "qemu-user-binfmt".to_string(),
            format!("gcc-{}", self.triple),
            format!("libc6-dev-{}-cross", self.debian_arch),
            format!("libtsan0-{}-cross", self.debian_arch),
        ]
    }
}
