// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ReportState, TestReport};
use crate::errors::{DisplayErrorChain, ReportError, SuiteError, TestFailure};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset, Local};
use debug_ignore::DebugIgnore;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use serde::{Deserialize, Serialize};
use std::{fs::File, time::Instant};

/// A report that writes one JUnit XML file per suite, named `TEST-<suite>.xml`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JunitReport {
    state: ReportState,
    #[serde(skip)]
    in_progress: DebugIgnore<Option<InProgressSuite>>,
}

#[derive(Clone)]
struct InProgressSuite {
    suite: TestSuite,
    start: Instant,
    current: Option<InProgressTest>,
}

#[derive(Clone)]
struct InProgressTest {
    start: Instant,
    timestamp: DateTime<FixedOffset>,
    status: Option<TestCaseStatus>,
}

impl JunitReport {
    /// Creates a new JUnit report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the path of the XML file written for `suite`.
    pub fn suite_path(output_dir: &Utf8Path, suite: &str) -> Utf8PathBuf {
        output_dir.join(format!("TEST-{suite}.xml"))
    }
}

impl TestReport for JunitReport {
    fn init(&mut self, output_dir: &Utf8Path) -> Result<(), ReportError> {
        std::fs::create_dir_all(output_dir).map_err(|error| ReportError::Fs {
            file: output_dir.to_owned(),
            error,
        })?;
        self.state.init(output_dir);
        Ok(())
    }

    fn start_run(&mut self, count: usize) {
        self.state.start_run(count);
    }

    fn start_suite(&mut self, name: &str) {
        self.state.start_suite(name);
        let mut suite = TestSuite::new(name);
        suite.set_timestamp(Local::now().fixed_offset());
        self.in_progress.0 = Some(InProgressSuite {
            suite,
            start: Instant::now(),
            current: None,
        });
    }

    fn start_test(&mut self, name: &str) {
        self.state.start_test(name);
        if let Some(in_progress) = self.in_progress.0.as_mut() {
            in_progress.current = Some(InProgressTest {
                start: Instant::now(),
                timestamp: Local::now().fixed_offset(),
                status: None,
            });
        }
    }

    fn failure(&mut self, name: &str, failure: &TestFailure) {
        self.state.failure(name);
        if let Some(test) = self
            .in_progress
            .0
            .as_mut()
            .and_then(|s| s.current.as_mut())
        {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status
                .set_message(failure.message())
                .set_type(failure.kind().as_str());
            test.status = Some(status);
        }
    }

    fn skip(&mut self, name: &str) {
        self.state.skip(name);
        if let Some(test) = self
            .in_progress
            .0
            .as_mut()
            .and_then(|s| s.current.as_mut())
        {
            test.status = Some(TestCaseStatus::skipped());
        }
    }

    fn end_test(&mut self, name: &str) {
        self.state.end_test(name);
        let Some(in_progress) = self.in_progress.0.as_mut() else {
            return;
        };
        let Some(test) = in_progress.current.take() else {
            return;
        };

        let mut testcase = TestCase::new(
            name,
            test.status.unwrap_or_else(TestCaseStatus::success),
        );
        testcase
            .set_classname(in_progress.suite.name.clone())
            .set_timestamp(test.timestamp)
            .set_time(test.start.elapsed());
        in_progress.suite.add_test_case(testcase);
    }

    fn suite_error(&mut self, name: &str, error: &SuiteError) {
        self.state.suite_error(name);
        if let Some(in_progress) = self.in_progress.0.as_mut() {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status
                .set_message(error.to_string())
                .set_description(DisplayErrorChain::new(error).to_string());
            let mut testcase = TestCase::new("(suite)", status);
            testcase.set_classname(in_progress.suite.name.clone());
            in_progress.suite.add_test_case(testcase);
        }
    }

    fn end_suite(&mut self) -> Result<(), ReportError> {
        self.state.end_suite();
        let Some(mut in_progress) = self.in_progress.0.take() else {
            return Ok(());
        };
        let output_dir = self
            .state
            .output_dir()
            .ok_or(ReportError::NotInitialized)?;

        in_progress.suite.set_time(in_progress.start.elapsed());
        let suite_name = in_progress.suite.name.as_str().to_owned();
        let mut report = Report::new(suite_name.as_str());
        report.add_test_suite(in_progress.suite);

        let path = Self::suite_path(output_dir, &suite_name);
        let f = File::create(&path).map_err(|error| ReportError::Fs {
            file: path.clone(),
            error,
        })?;
        report
            .serialize(f)
            .map_err(|error| ReportError::Junit { file: path, error })?;
        Ok(())
    }

    fn stop_run(&mut self) -> Result<(), ReportError> {
        Ok(())
    }

    fn state(&self) -> &ReportState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HookKind;

    #[test]
    fn writes_one_file_per_suite() {
        let dir = camino_tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");

        let mut report = JunitReport::new();
        report.init(&out).unwrap();
        report.start_run(2);

        report.start_suite("a.B");
        report.start_test("testPass");
        report.end_test("testPass");
        report.start_test("testFail");
        report.failure("testFail", &TestFailure::assertion("expected 2, got 3"));
        report.end_test("testFail");
        report.start_test("testSkip");
        report.skip("testSkip");
        report.end_test("testSkip");
        report.end_suite().unwrap();

        report.start_suite("a.C");
        report.suite_error(
            "a.C",
            &SuiteError::Hook {
                hook: HookKind::BeforeAll,
                class_name: "a.C".to_owned(),
                failure: TestFailure::error("no database"),
            },
        );
        report.end_suite().unwrap();
        report.stop_run().unwrap();

        let b = std::fs::read_to_string(JunitReport::suite_path(&out, "a.B")).unwrap();
        assert!(b.contains(r#"<testsuite name="a.B" tests="3""#), "{b}");
        assert!(b.contains(r#"<testcase name="testPass" classname="a.B""#), "{b}");
        assert!(
            b.contains(r#"<failure message="expected 2, got 3" type="assertion failed""#),
            "{b}"
        );
        assert!(b.contains("<skipped"), "{b}");

        let c = std::fs::read_to_string(JunitReport::suite_path(&out, "a.C")).unwrap();
        assert!(c.contains("<error"), "{c}");
        assert!(c.contains("no database"), "{c}");

        assert_eq!(report.suites_run(), 2);
        assert_eq!(report.suites_failed(), 1);
    }

    #[test]
    fn end_suite_without_init() {
        let mut report = JunitReport::new();
        report.start_suite("s");
        assert!(matches!(
            report.end_suite(),
            Err(ReportError::NotInitialized)
        ));
    }
}
