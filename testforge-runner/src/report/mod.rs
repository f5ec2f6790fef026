// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test reports: the sink for suite and test lifecycle events.
//!
//! A report is created fresh or restored from a report spec file, bound to an output directory
//! with [`TestReport::init`], and then fed events:
//!
//! ```text
//! start_run(count)
//!     start_suite(name)
//!         start_test(name) [failure(name) | skip(name)] end_test(name)
//!         ...
//!     [suite_error(name)] end_suite()
//!     ...
//! stop_run()
//! ```
//!
//! Reports cross process boundaries through [`write_report_spec`] and [`read_report_spec`].

mod junit;
mod simple;
mod spec;

pub use junit::*;
pub use simple::*;
pub use spec::*;

use crate::errors::{ReportError, SuiteError, TestFailure};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sink for suite and test lifecycle events.
pub trait TestReport {
    /// Binds the report to an output directory. Must be called before any other event.
    fn init(&mut self, output_dir: &Utf8Path) -> Result<(), ReportError>;

    /// Called once at the start of a whole run, with the number of suites expected.
    fn start_run(&mut self, count: usize);

    /// Called when a suite starts.
    fn start_suite(&mut self, name: &str);

    /// Called when a test starts.
    fn start_test(&mut self, name: &str);

    /// Called when the current test fails.
    fn failure(&mut self, name: &str, failure: &TestFailure);

    /// Called when the current test is skipped.
    fn skip(&mut self, name: &str);

    /// Called when a test ends.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not the current test.
    fn end_test(&mut self, name: &str);

    /// Called when a suite failed outside the per-test harness.
    fn suite_error(&mut self, name: &str, error: &SuiteError);

    /// Called when a suite ends.
    fn end_suite(&mut self) -> Result<(), ReportError>;

    /// Called once at the end of a whole run.
    fn stop_run(&mut self) -> Result<(), ReportError>;

    /// Returns the report's bookkeeping.
    fn state(&self) -> &ReportState;

    /// Returns the number of suites that have run.
    fn suites_run(&self) -> usize {
        self.state().suites_run()
    }

    /// Returns the number of suites with at least one failed test.
    fn suites_failed(&self) -> usize {
        self.state().suites_failed()
    }

    /// Returns the test currently running, if any.
    fn current_test(&self) -> Option<&str> {
        self.state().current_test()
    }

    /// Returns the suite currently running, if any.
    fn current_suite(&self) -> Option<&str> {
        self.state().current_suite()
    }
}

/// Bookkeeping shared by all reports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReportState {
    output_dir: Option<Utf8PathBuf>,
    suites_expected: usize,
    suites_run: usize,
    suites_failed: usize,
    suites_errored: usize,
    tests_run: usize,
    tests_failed: usize,
    tests_skipped: usize,
    failed_suites: Vec<String>,
    errored_suites: Vec<String>,
    current_suite: Option<String>,
    current_suite_failed: bool,
    current_test: Option<String>,
    current_test_failed: bool,
}

impl ReportState {
    /// Records the output directory.
    pub fn init(&mut self, output_dir: &Utf8Path) {
        self.output_dir = Some(output_dir.to_owned());
    }

    /// Records the start of a run.
    pub fn start_run(&mut self, count: usize) {
        self.suites_expected = count;
    }

    /// Records the start of a suite.
    pub fn start_suite(&mut self, name: &str) {
        self.current_suite = Some(name.to_owned());
        self.current_suite_failed = false;
        self.current_test = None;
    }

    /// Records the start of a test.
    ///
    /// # Panics
    ///
    /// Panics if another test has not ended yet.
    pub fn start_test(&mut self, name: &str) {
        if let Some(current) = &self.current_test {
            panic!("test `{name}` started before test `{current}` ended");
        }
        self.current_test = Some(name.to_owned());
        self.current_test_failed = false;
        self.tests_run += 1;
    }

    /// Records a failure of the current test.
    pub fn failure(&mut self, name: &str) {
        self.assert_current_test(name);
        if !self.current_test_failed {
            self.current_test_failed = true;
            self.tests_failed += 1;
        }
        self.current_suite_failed = true;
    }

    /// Records that the current test was skipped.
    pub fn skip(&mut self, name: &str) {
        self.assert_current_test(name);
        self.tests_skipped += 1;
    }

    /// Records the end of a test. Returns true if it failed.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not the current test.
    pub fn end_test(&mut self, name: &str) -> bool {
        self.assert_current_test(name);
        self.current_test = None;
        std::mem::take(&mut self.current_test_failed)
    }

    /// Records a suite-level error.
    pub fn suite_error(&mut self, name: &str) {
        self.suites_errored += 1;
        self.errored_suites.push(name.to_owned());
    }

    /// Records the end of the current suite. Returns the suite's name and whether it failed.
    pub fn end_suite(&mut self) -> Option<(String, bool)> {
        let name = self.current_suite.take()?;
        // A test left open here was aborted by a suite-level error.
        self.current_test = None;
        self.suites_run += 1;
        let failed = std::mem::take(&mut self.current_suite_failed);
        if failed {
            self.suites_failed += 1;
            self.failed_suites.push(name.clone());
        }
        Some((name, failed))
    }

    fn assert_current_test(&self, name: &str) {
        if self.current_test.as_deref() != Some(name) {
            panic!(
                "test `{name}` is not the current test (current test: {:?})",
                self.current_test
            );
        }
    }

    /// Returns the output directory, if the report was initialized.
    pub fn output_dir(&self) -> Option<&Utf8Path> {
        self.output_dir.as_deref()
    }

    /// Returns the number of suites expected by [`start_run`](Self::start_run).
    pub fn suites_expected(&self) -> usize {
        self.suites_expected
    }

    /// Returns the number of suites that have run.
    pub fn suites_run(&self) -> usize {
        self.suites_run
    }

    /// Returns the number of suites with at least one failed test.
    pub fn suites_failed(&self) -> usize {
        self.suites_failed
    }

    /// Returns the number of suites that failed outside the per-test harness.
    pub fn suites_errored(&self) -> usize {
        self.suites_errored
    }

    /// Returns the number of tests started.
    pub fn tests_run(&self) -> usize {
        self.tests_run
    }

    /// Returns the number of failed tests.
    pub fn tests_failed(&self) -> usize {
        self.tests_failed
    }

    /// Returns the number of skipped tests.
    pub fn tests_skipped(&self) -> usize {
        self.tests_skipped
    }

    /// Returns the number of tests that passed.
    pub fn tests_passed(&self) -> usize {
        self.tests_run
            .saturating_sub(self.tests_failed)
            .saturating_sub(self.tests_skipped)
    }

    /// Returns the names of failed suites, in the order they ended.
    pub fn failed_suites(&self) -> &[String] {
        &self.failed_suites
    }

    /// Returns the names of errored suites.
    pub fn errored_suites(&self) -> &[String] {
        &self.errored_suites
    }

    /// Returns the suite currently running, if any.
    pub fn current_suite(&self) -> Option<&str> {
        self.current_suite.as_deref()
    }

    /// Returns the test currently running, if any.
    pub fn current_test(&self) -> Option<&str> {
        self.current_test.as_deref()
    }
}

/// The kinds of report that can be requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Human-readable console output.
    Simple,

    /// One JUnit XML file per suite.
    Junit,
}

impl ReportKind {
    /// Returns the string representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Junit => "junit",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete, serializable report.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Report {
    /// Console output.
    Simple(SimpleReport),

    /// JUnit XML output.
    Junit(JunitReport),

    /// Several reports fed the same events.
    Composite(CompositeReport),
}

impl Report {
    /// Creates a report out of the requested kinds.
    ///
    /// No kinds means a [`SimpleReport`]; a single kind means that report; several kinds mean a
    /// composite of them.
    pub fn from_kinds(kinds: &[ReportKind]) -> Self {
        let mut reports: Vec<Report> = kinds
            .iter()
            .map(|kind| match kind {
                ReportKind::Simple => Report::Simple(SimpleReport::new()),
                ReportKind::Junit => Report::Junit(JunitReport::new()),
            })
            .collect();
        match reports.len() {
            0 => Report::Simple(SimpleReport::new()),
            1 => reports.swap_remove(0),
            _ => Report::Composite(CompositeReport::new(reports)),
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn TestReport {
        match self {
            Report::Simple(r) => r,
            Report::Junit(r) => r,
            Report::Composite(r) => r,
        }
    }

    fn as_dyn(&self) -> &dyn TestReport {
        match self {
            Report::Simple(r) => r,
            Report::Junit(r) => r,
            Report::Composite(r) => r,
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Report::Simple(SimpleReport::new())
    }
}

impl TestReport for Report {
    fn init(&mut self, output_dir: &Utf8Path) -> Result<(), ReportError> {
        self.as_dyn_mut().init(output_dir)
    }

    fn start_run(&mut self, count: usize) {
        self.as_dyn_mut().start_run(count)
    }

    fn start_suite(&mut self, name: &str) {
        self.as_dyn_mut().start_suite(name)
    }

    fn start_test(&mut self, name: &str) {
        self.as_dyn_mut().start_test(name)
    }

    fn failure(&mut self, name: &str, failure: &TestFailure) {
        self.as_dyn_mut().failure(name, failure)
    }

    fn skip(&mut self, name: &str) {
        self.as_dyn_mut().skip(name)
    }

    fn end_test(&mut self, name: &str) {
        self.as_dyn_mut().end_test(name)
    }

    fn suite_error(&mut self, name: &str, error: &SuiteError) {
        self.as_dyn_mut().suite_error(name, error)
    }

    fn end_suite(&mut self) -> Result<(), ReportError> {
        self.as_dyn_mut().end_suite()
    }

    fn stop_run(&mut self) -> Result<(), ReportError> {
        self.as_dyn_mut().stop_run()
    }

    fn state(&self) -> &ReportState {
        self.as_dyn().state()
    }
}

/// Feeds the same events to several reports.
///
/// Bookkeeping queries are answered from the composite's own state.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompositeReport {
    state: ReportState,
    reports: Vec<Report>,
}

impl CompositeReport {
    /// Creates a new composite report.
    pub fn new(reports: Vec<Report>) -> Self {
        Self {
            state: ReportState::default(),
            reports,
        }
    }

    /// Returns the child reports.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }
}

impl TestReport for CompositeReport {
    fn init(&mut self, output_dir: &Utf8Path) -> Result<(), ReportError> {
        self.state.init(output_dir);
        self.reports
            .iter_mut()
            .try_for_each(|r| r.init(output_dir))
    }

    fn start_run(&mut self, count: usize) {
        self.state.start_run(count);
        self.reports.iter_mut().for_each(|r| r.start_run(count));
    }

    fn start_suite(&mut self, name: &str) {
        self.state.start_suite(name);
        self.reports.iter_mut().for_each(|r| r.start_suite(name));
    }

    fn start_test(&mut self, name: &str) {
        self.state.start_test(name);
        self.reports.iter_mut().for_each(|r| r.start_test(name));
    }

    fn failure(&mut self, name: &str, failure: &TestFailure) {
        self.state.failure(name);
        self.reports
            .iter_mut()
            .for_each(|r| r.failure(name, failure));
    }

    fn skip(&mut self, name: &str) {
        self.state.skip(name);
        self.reports.iter_mut().for_each(|r| r.skip(name));
    }

    fn end_test(&mut self, name: &str) {
        self.state.end_test(name);
        self.reports.iter_mut().for_each(|r| r.end_test(name));
    }

    fn suite_error(&mut self, name: &str, error: &SuiteError) {
        self.state.suite_error(name);
        self.reports
            .iter_mut()
            .for_each(|r| r.suite_error(name, error));
    }

    fn end_suite(&mut self) -> Result<(), ReportError> {
        self.state.end_suite();
        // Every child gets to end its suite even if an earlier one fails to write.
        let mut first_error = None;
        for report in &mut self.reports {
            if let Err(error) = report.end_suite() {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn stop_run(&mut self) -> Result<(), ReportError> {
        let mut first_error = None;
        for report in &mut self.reports {
            if let Err(error) = report.stop_run() {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn state(&self) -> &ReportState {
        &self.state
    }
}
