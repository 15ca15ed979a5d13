//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on names,
//! identifiers and in-memory records and return deterministic outputs
//! suitable for tests.

pub mod cross;
pub mod exclusion;
pub mod options;
pub mod race;
pub mod syso;
pub mod target;
pub mod types;
