// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for testforge child processes.
///
/// External tooling branches on these values, so they must never change. Note that on Unix, a
/// process exit code is truncated to its low 8 bits: a child exiting with `NO_TESTS` is observed
/// by its parent as 255, `FAILURE` as 254 and `ERROR` as 253. Use [`TestExitCode::normalize`] to
/// map an observed code back.
pub enum TestExitCode {}

impl TestExitCode {
    /// The run completed and no suites failed.
    pub const OK: i32 = 0;

    /// No suites were run, and the run was configured to fail if empty.
    pub const NO_TESTS: i32 = -1;

    /// One or more suites failed.
    pub const FAILURE: i32 = -2;

    /// An infrastructure error occurred: a class could not be loaded, a creator could not be
    /// instantiated, or the report could not be restored.
    pub const ERROR: i32 = -3;

    /// Maps an exit code as observed by a parent process back to one of the documented codes.
    ///
    /// Returns `None` if the code is not one of the documented codes, in either its signed or its
    /// 8-bit truncated form.
    pub fn normalize(code: i32) -> Option<i32> {
        match code {
            Self::OK | Self::NO_TESTS | Self::FAILURE | Self::ERROR => Some(code),
            255 => Some(Self::NO_TESTS),
            254 => Some(Self::FAILURE),
            253 => Some(Self::ERROR),
            _ => None,
        }
    }
}
