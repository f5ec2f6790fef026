// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testforge: discovering test classes, building test sets out of them,
//! running those test sets either in-process or in forked child processes, and reporting results.
//!
//! The basic flow is:
//!
//! 1. A [`TestModuleConfig`](config::TestModuleConfig) is handed to a
//!    [`TestLauncher`](launcher::TestLauncher).
//! 2. The launcher either runs a [`TestRunner`](runner::TestRunner) in the current process, or
//!    spawns children that run the [`entry`] protocol.
//! 3. Each runner scans the test classes directory, loads classes through a
//!    [`ClassLoader`](classes::ClassLoader), and asks a
//!    [`TestSetCreator`](creator::TestSetCreator) to turn them into test sets.
//! 4. Results flow into a [`TestReport`](report::TestReport), and exit classifications are merged
//!    by worst-result aggregation.

pub mod classes;
pub mod config;
pub mod context;
pub mod creator;
pub mod entry;
pub mod errors;
pub mod helpers;
pub mod launcher;
pub mod output;
pub mod pattern;
pub mod report;
pub mod runner;
pub mod scanner;
