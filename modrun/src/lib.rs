//! CI helpers for multi-module Go repositories.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (exclusion rules, race
//!   eligibility, target and runtime resolution, outcomes). No I/O.
//! - **[`io`]**: Side-effecting adapters (filesystem walk, child processes,
//!   CI reporting, package installation, downloads, config).
//!
//! [`orchestrate`] and [`setup`] compose the two into the `test` and
//! `setup-env` commands exposed through [`cli`].

pub mod cli;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrate;
pub mod setup;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
