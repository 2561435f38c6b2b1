//! I/O for capture and validation: git, child processes, files, config.

pub mod capture;
pub mod config;
pub mod git;
pub mod predictions;
pub mod process;
pub mod validator;
