// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Annotation-driven discovery.
//!
//! Every class with at least one annotated test method is a test unit. Tests are executed by a
//! [`ListenerRunner`], which notifies a [`RunListener`] of each test's progress; the
//! [`ReportListener`] adapter forwards those notifications to a [`TestReport`]. Group filtering
//! is not applied here.

use super::{CreatorParams, TestSet, TestSetCreator};
use crate::{
    classes::{GroupMarker, OBJECT_CLASS, TestClass, TestMethod},
    context::TestContext,
    errors::{HookKind, SuiteError, TestFailure},
    report::TestReport,
};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Identifies a single test to a [`RunListener`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    class_name: String,
    method_name: String,
}

impl Description {
    /// Creates a new description.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Returns the name of the class the test belongs to.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the name of the test method.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method_name, self.class_name)
    }
}

/// Receives notifications about tests run by a [`ListenerRunner`].
pub trait RunListener {
    /// A test is about to run.
    fn test_started(&mut self, description: &Description);

    /// The running test failed.
    fn test_failure(&mut self, description: &Description, failure: &TestFailure);

    /// A test was not run because it is ignored. No other notification is sent for it.
    fn test_ignored(&mut self, description: &Description);

    /// A test finished, whether or not it failed.
    fn test_finished(&mut self, description: &Description);
}

/// Counts of what a [`ListenerRunner`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tests that ran.
    pub run_count: usize,

    /// Tests that failed.
    pub failure_count: usize,

    /// Tests that were ignored.
    pub ignore_count: usize,
}

/// Runs the annotated test methods of a class.
#[derive(Clone, Debug)]
pub struct ListenerRunner {
    class: Arc<TestClass>,
    only: Option<String>,
}

impl ListenerRunner {
    /// Creates a runner for all annotated methods of `class`.
    pub fn new(class: Arc<TestClass>) -> Self {
        Self { class, only: None }
    }

    /// Restricts the runner to the method named `name`.
    pub fn filter_method(mut self, name: impl Into<String>) -> Self {
        self.only = Some(name.into());
        self
    }

    fn methods(&self) -> impl Iterator<Item = &TestMethod> + '_ {
        self.class.methods().iter().filter(|m| {
            m.is_annotated() && self.only.as_deref().is_none_or(|only| m.name() == only)
        })
    }

    /// Runs the tests, notifying `listener`.
    ///
    /// Per-class hooks that fail abort the run with a [`SuiteError`].
    pub fn run(
        &self,
        listener: &mut dyn RunListener,
        ctx: &TestContext,
    ) -> Result<RunSummary, SuiteError> {
        let hook_error = |hook, failure| SuiteError::Hook {
            hook,
            class_name: self.class.name().to_owned(),
            failure,
        };

        let mut summary = RunSummary::default();
        self.class
            .run_hook(HookKind::BeforeAll, ctx)
            .map_err(|failure| hook_error(HookKind::BeforeAll, failure))?;

        for method in self.methods() {
            let description = Description::new(self.class.name(), method.name());
            if method.is_ignored() {
                listener.test_ignored(&description);
                summary.ignore_count += 1;
                continue;
            }

            listener.test_started(&description);
            summary.run_count += 1;
            if let Err(failure) = self.class.invoke(method.body(), ctx) {
                listener.test_failure(&description, &failure);
                summary.failure_count += 1;
            }
            listener.test_finished(&description);
        }

        self.class
            .run_hook(HookKind::AfterAll, ctx)
            .map_err(|failure| hook_error(HookKind::AfterAll, failure))?;
        Ok(summary)
    }
}

/// Forwards [`RunListener`] notifications to a [`TestReport`].
pub struct ReportListener<'a> {
    report: &'a mut dyn TestReport,
}

impl<'a> ReportListener<'a> {
    /// Creates a new adapter.
    pub fn new(report: &'a mut dyn TestReport) -> Self {
        Self { report }
    }
}

impl RunListener for ReportListener<'_> {
    fn test_started(&mut self, description: &Description) {
        self.report.start_test(description.method_name());
    }

    fn test_failure(&mut self, description: &Description, failure: &TestFailure) {
        self.report.failure(description.method_name(), failure);
    }

    fn test_ignored(&mut self, description: &Description) {
        let name = description.method_name();
        self.report.start_test(name);
        self.report.skip(name);
        self.report.end_test(name);
    }

    fn test_finished(&mut self, description: &Description) {
        self.report.end_test(description.method_name());
    }
}

/// The annotation-driven creator, registered as `junit4`.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedCreator {
    params: CreatorParams,
}

impl AnnotatedCreator {
    /// The name this creator is registered under.
    pub const NAME: &'static str = "junit4";

    /// Creates a new annotation-driven creator.
    ///
    /// Requested groups are ignored by this creator.
    pub fn new(params: CreatorParams) -> Self {
        Self { params }
    }
}

impl TestSetCreator for AnnotatedCreator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn test_class(&self) -> &str {
        OBJECT_CLASS
    }

    fn create_test_set(&self, class: &Arc<TestClass>) -> Option<Box<dyn TestSet>> {
        let mut runner = ListenerRunner::new(class.clone());
        if let Some(single_test) = &self.params.single_test {
            runner = runner.filter_method(single_test);
        }
        if runner.methods().next().is_none() {
            debug!("skipping {}: no annotated test methods", class.name());
            return None;
        }
        Some(Box::new(AnnotatedTestSet { runner }))
    }
}

#[derive(Debug)]
struct AnnotatedTestSet {
    runner: ListenerRunner,
}

impl TestSet for AnnotatedTestSet {
    fn name(&self) -> &str {
        self.runner.class.name()
    }

    fn test_class(&self) -> &Arc<TestClass> {
        &self.runner.class
    }

    fn groups(&self) -> Option<&GroupMarker> {
        None
    }

    fn run(&self, report: &mut dyn TestReport, ctx: &TestContext) -> Result<(), SuiteError> {
        let summary = self.runner.run(&mut ReportListener::new(report), ctx)?;
        debug!("{}: {summary:?}", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Report, SimpleReport};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingListener {
        events: Vec<String>,
    }

    impl RunListener for RecordingListener {
        fn test_started(&mut self, description: &Description) {
            self.events.push(format!("started {description}"));
        }

        fn test_failure(&mut self, description: &Description, failure: &TestFailure) {
            self.events
                .push(format!("failed {description}: {}", failure.message()));
        }

        fn test_ignored(&mut self, description: &Description) {
            self.events.push(format!("ignored {description}"));
        }

        fn test_finished(&mut self, description: &Description) {
            self.events.push(format!("finished {description}"));
        }
    }

    fn annotated_class() -> Arc<TestClass> {
        TestClass::builder("a.Annotated")
            .annotated_test("adds", |_| Ok(()))
            .annotated_test("fails", |_| Err(TestFailure::assertion("bad sum")))
            .method(TestMethod::new("slow", |_| Ok(())).annotated().ignored())
            .test("testNotAnnotated", |_| Ok(()))
            .build()
    }

    #[test]
    fn listener_notifications() {
        let runner = ListenerRunner::new(annotated_class());
        let mut listener = RecordingListener::default();
        let summary = runner.run(&mut listener, &TestContext::default()).unwrap();
        assert_eq!(
            listener.events,
            [
                "started adds(a.Annotated)",
                "finished adds(a.Annotated)",
                "started fails(a.Annotated)",
                "failed fails(a.Annotated): bad sum",
                "finished fails(a.Annotated)",
                "ignored slow(a.Annotated)",
            ]
        );
        assert_eq!(
            summary,
            RunSummary {
                run_count: 2,
                failure_count: 1,
                ignore_count: 1,
            }
        );
    }

    #[test]
    fn report_adapter() {
        let creator = AnnotatedCreator::default();
        assert_eq!(creator.test_class(), OBJECT_CLASS);
        let set = creator.create_test_set(&annotated_class()).unwrap();

        let mut report = Report::Simple(SimpleReport::new_captured());
        report.start_suite(set.name());
        set.run(&mut report, &TestContext::default()).unwrap();
        report.end_suite().unwrap();

        let state = report.state();
        assert_eq!(state.tests_run(), 3);
        assert_eq!(state.tests_failed(), 1);
        assert_eq!(state.tests_skipped(), 1);
        assert_eq!(state.suites_failed(), 1);
    }

    #[test]
    fn declines_classes_without_annotations() {
        let class = TestClass::builder("a.Old")
            .extends("TestCase")
            .test("testIt", |_| Ok(()))
            .build();
        assert!(
            AnnotatedCreator::default()
                .create_test_set(&class)
                .is_none()
        );
    }

    #[test]
    fn single_test() {
        let creator = AnnotatedCreator::new(CreatorParams {
            groups: Vec::new(),
            single_test: Some("fails".to_owned()),
        });
        let set = creator.create_test_set(&annotated_class()).unwrap();
        let mut report = Report::Simple(SimpleReport::new_captured());
        report.start_suite(set.name());
        set.run(&mut report, &TestContext::default()).unwrap();
        report.end_suite().unwrap();
        assert_eq!(report.state().tests_run(), 1);
        assert_eq!(report.state().tests_failed(), 1);

        let missing = AnnotatedCreator::new(CreatorParams {
            groups: Vec::new(),
            single_test: Some("nope".to_owned()),
        });
        assert!(missing.create_test_set(&annotated_class()).is_none());
    }

    #[test]
    fn after_all_failure_is_a_suite_error() {
        let class = TestClass::builder("a.Teardown")
            .annotated_test("ok", |_| Ok(()))
            .after_all(|_| panic!("teardown exploded"))
            .build();
        let mut listener = RecordingListener::default();
        let err = ListenerRunner::new(class)
            .run(&mut listener, &TestContext::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "after-all hook for `a.Teardown` failed");
        assert_eq!(listener.events.len(), 2, "tests ran before the hook");
    }
}
