//! Change capture and patch validation for agent benchmark runs.
//!
//! Turns the evidence a coding agent leaves behind into a single unified diff
//! and checks that diff before it is submitted. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (diff parsing and rendering,
//!   snapshot diffing, response scanning, submission records). No I/O.
//! - **[`io`]**: Side-effecting operations (git subprocesses, temp files,
//!   config, predictions files). Every subprocess receives its working
//!   directory explicitly; nothing here changes the process-wide cwd.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::PatchError;
