//! Stable exit codes for `patchcap` commands.

/// Command succeeded; every check that ran passed.
pub const OK: i32 = 0;
/// Command failed: bad arguments, unreadable input, config or git errors.
pub const ERROR: i32 = 1;
/// The patch was rejected by a structural or applicability check.
pub const REJECTED: i32 = 2;
