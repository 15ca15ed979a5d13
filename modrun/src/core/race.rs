//! Race detector eligibility.
//!
//! The race detector only ships for a fixed set of OS/architecture pairs.
//! Ineligible targets silently run without `-race` instead of failing.

use super::target::Target;

/// Pure allow-list lookup for race detector support.
pub fn race_supported(os: &str, arch: &str) -> bool {
    match os {
        "linux" => matches!(arch, "amd64" | "arm64" | "ppc64le" | "s390x"),
        "freebsd" | "netbsd" | "darwin" | "windows" => arch == "amd64",
        _ => false,
    }
}

/// Final race decision for a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceDecision {
    Enabled,
    /// Target is not on the allow-list, or race was turned off by config.
    Disabled,
    /// Target is eligible but runs under QEMU user-mode emulation, where
    /// ThreadSanitizer fails with "unsupported VMA range". Cgo is dropped too.
    DisabledUnderEmulation,
}

impl RaceDecision {
    pub fn is_enabled(self) -> bool {
        self == RaceDecision::Enabled
    }

    /// Whether `CGO_ENABLED` must be removed from the test environment.
    pub fn strips_cgo(self) -> bool {
        self == RaceDecision::DisabledUnderEmulation
    }
}

/// Decide whether `-race` is passed, given the target and whether tests run
/// under emulation (a QEMU loader prefix is configured).
pub fn race_decision(target: &Target, allowed: bool, emulated: bool) -> RaceDecision {
    if !allowed {
        return RaceDecision::Disabled;
    }
    if emulated && target.os == "linux" && target.arch == "arm64" {
        return RaceDecision::DisabledUnderEmulation;
    }
    if race_supported(&target.os, &target.arch) {
        RaceDecision::Enabled
    } else {
        RaceDecision::Disabled
    }
}
