//! Stable exit codes for modrun CLI commands.

/// Command succeeded; every module passed.
pub const OK: i32 = 0;
/// At least one module (or setup step) failed. All modules were still attempted.
pub const FAILED: i32 = 1;
/// Command could not run: bad config, unreadable root, toolchain unavailable.
pub const INVALID: i32 = 2;
