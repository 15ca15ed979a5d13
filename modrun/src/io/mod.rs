//! I/O adapters: filesystem, child processes, CI reporting, network.

pub mod actions;
pub mod apt;
pub mod config;
pub mod discover;
pub mod download;
pub mod process;
pub mod toolchain;
