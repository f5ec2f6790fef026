// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Cross-process vocabulary for testforge.
//!
//! A testforge launcher communicates with the child processes it spawns through command-line
//! arguments and process exit codes. The types in this crate describe the parts of that protocol
//! that must stay stable across versions.

mod errors;
mod exit_codes;
mod invocation;

pub use errors::*;
pub use exit_codes::*;
pub use invocation::*;
