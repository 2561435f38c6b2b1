//! Deterministic, pure logic for diffs and agent evidence.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and return deterministic outputs suitable for tests.

pub mod patch;
pub mod scanner;
pub mod snapshot;
pub mod submission;
pub mod types;
