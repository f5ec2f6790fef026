// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convention-based suite discovery.
//!
//! A class is a test unit if it declares a static suite factory, or if it is assignable to
//! [`TEST_CASE_CLASS`] and has at least one method whose name starts with `test`. A suite
//! factory may carry a [`GroupMarker`] that selects which runs it takes part in; see
//! [`must_run`].

use super::{CreatorParams, TestSet, TestSetCreator};
use crate::{
    classes::{GroupMarker, OBJECT_CLASS, TestClass, TestFn, TestMethod, call_catching_panics},
    context::TestContext,
    errors::{HookKind, SuiteError, TestFailure},
    report::TestReport,
};
use debug_ignore::DebugIgnore;
use std::sync::Arc;
use tracing::debug;

/// The base type of convention-based test classes.
pub const TEST_CASE_CLASS: &str = "TestCase";

/// The type that declares the placeholder case of an empty suite.
pub const SUITE_CLASS: &str = "TestSuite";

/// The name of the placeholder case of an empty suite.
pub const WARNING_CASE: &str = "warning";

/// The prefix of convention-based test method names.
pub const TEST_METHOD_PREFIX: &str = "test";

/// Returns true if a suite with the given group marker should run when `requested` groups are
/// requested.
///
/// * A skip marker never runs.
/// * With no groups requested, everything else runs.
/// * With groups requested, a suite without a marker does not run, and a suite with a marker runs
///   if it names a requested group or either side names the `ALL` group.
pub fn must_run(marker: Option<&GroupMarker>, requested: &[String]) -> bool {
    match marker {
        Some(marker) => marker.admits(requested),
        None => requested.is_empty(),
    }
}

/// A named list of test cases.
#[derive(Clone, Debug)]
pub struct Suite {
    name: String,
    cases: Vec<SuiteCase>,
}

impl Suite {
    /// Creates an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    /// Builds the default suite for a class: one case per method whose name starts with `test`,
    /// in declaration order.
    ///
    /// A class without such methods yields a suite holding only a placeholder case that fails
    /// with a warning.
    pub fn from_class(class: &Arc<TestClass>) -> Self {
        let mut suite = Self::new(class.name());
        for method in class.methods() {
            if method.name().starts_with(TEST_METHOD_PREFIX) {
                suite.add_case(SuiteCase::for_method(class, method));
            }
        }
        if suite.cases.is_empty() {
            return Self::warning(class.name(), format!("no tests found in {}", class.name()));
        }
        suite
    }

    /// Builds a suite of the named methods of a class. Unknown names are ignored.
    pub fn for_methods<'a>(
        class: &Arc<TestClass>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut suite = Self::new(class.name());
        for name in names {
            if let Some(method) = class.method(name) {
                suite.add_case(SuiteCase::for_method(class, method));
            }
        }
        suite
    }

    /// Builds a suite holding a single placeholder case that fails with `message`.
    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut suite = Self::new(name);
        suite.add_case(SuiteCase::new(WARNING_CASE, SUITE_CLASS, move |_| {
            Err(TestFailure::error(message.clone()))
        }));
        suite
    }

    /// Adds a case.
    pub fn add_case(&mut self, case: SuiteCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    /// Returns the suite name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cases.
    pub fn cases(&self) -> &[SuiteCase] {
        &self.cases
    }

    /// Returns true if this is the placeholder suite built for a class without tests.
    pub fn is_warning_placeholder(&self) -> bool {
        match self.cases.as_slice() {
            [case] => case.name == WARNING_CASE && case.declaring_type == SUITE_CLASS,
            _ => false,
        }
    }

    /// Keeps only the cases named `name`.
    pub fn retain_case(&mut self, name: &str) {
        self.cases.retain(|case| case.name == name);
    }
}

/// A single case in a [`Suite`].
#[derive(Clone, Debug)]
pub struct SuiteCase {
    name: String,
    declaring_type: String,
    groups: Option<GroupMarker>,
    body: DebugIgnore<TestFn>,
}

impl SuiteCase {
    /// Creates a new case.
    pub fn new(
        name: impl Into<String>,
        declaring_type: impl Into<String>,
        body: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.into(),
            groups: None,
            body: DebugIgnore(Arc::new(body)),
        }
    }

    /// Creates a case that runs `method` of `class`, wrapped in the class's per-test hooks.
    pub fn for_method(class: &Arc<TestClass>, method: &TestMethod) -> Self {
        let class_ref = class.clone();
        let body = method.body().clone();
        Self {
            name: method.name().to_owned(),
            declaring_type: class.name().to_owned(),
            groups: method.groups().cloned(),
            body: DebugIgnore(Arc::new(move |ctx| class_ref.invoke(&body, ctx))),
        }
    }

    /// Returns the case name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the type that declares the case.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Returns the case's group marker, if any.
    pub fn groups(&self) -> Option<&GroupMarker> {
        self.groups.as_ref()
    }
}

/// The convention-based creator, registered as `junit`.
#[derive(Clone, Debug, Default)]
pub struct ConventionCreator {
    params: CreatorParams,
}

impl ConventionCreator {
    /// The name this creator is registered under.
    pub const NAME: &'static str = "junit";

    /// Creates a new convention-based creator.
    pub fn new(params: CreatorParams) -> Self {
        Self { params }
    }

    fn build_suite(&self, class: &Arc<TestClass>) -> Option<(Suite, Option<GroupMarker>)> {
        if let Some(factory) = class.suite_factory() {
            if !must_run(factory.groups(), &self.params.groups) {
                debug!(
                    "skipping {}: suite groups {:?} not selected by {:?}",
                    class.name(),
                    factory.groups(),
                    self.params.groups,
                );
                return None;
            }
            return Some((factory.build(class), factory.groups().cloned()));
        }

        if !class.is_assignable_to(TEST_CASE_CLASS) {
            return None;
        }
        if !must_run(None, &self.params.groups) {
            debug!("skipping {}: no group marker", class.name());
            return None;
        }
        Some((Suite::from_class(class), None))
    }
}

impl TestSetCreator for ConventionCreator {
    fn name(&self) -> &str {
        Self::NAME
    }

    // Suite factories may live on any class.
    fn test_class(&self) -> &str {
        OBJECT_CLASS
    }

    fn create_test_set(&self, class: &Arc<TestClass>) -> Option<Box<dyn TestSet>> {
        if let Some(single_test) = &self.params.single_test {
            class.method(single_test)?;
        }

        let (mut suite, groups) = self.build_suite(class)?;
        if suite.is_warning_placeholder() {
            debug!("skipping {}: no tests found", class.name());
            return None;
        }
        if let Some(single_test) = &self.params.single_test {
            suite.retain_case(single_test);
            if suite.cases.is_empty() {
                return None;
            }
        }

        Some(Box::new(ConventionTestSet {
            class: class.clone(),
            groups,
            suite,
            requested: self.params.groups.clone(),
        }))
    }
}

#[derive(Debug)]
struct ConventionTestSet {
    class: Arc<TestClass>,
    groups: Option<GroupMarker>,
    suite: Suite,
    requested: Vec<String>,
}

impl TestSet for ConventionTestSet {
    fn name(&self) -> &str {
        self.class.name()
    }

    fn test_class(&self) -> &Arc<TestClass> {
        &self.class
    }

    fn groups(&self) -> Option<&GroupMarker> {
        self.groups.as_ref()
    }

    fn run(&self, report: &mut dyn TestReport, ctx: &TestContext) -> Result<(), SuiteError> {
        let hook_error = |hook, failure| SuiteError::Hook {
            hook,
            class_name: self.class.name().to_owned(),
            failure,
        };

        self.class
            .run_hook(HookKind::BeforeAll, ctx)
            .map_err(|failure| hook_error(HookKind::BeforeAll, failure))?;

        for case in &self.suite.cases {
            report.start_test(&case.name);
            // A method-level marker can only narrow what the suite already selected.
            if case
                .groups
                .as_ref()
                .is_none_or(|marker| marker.admits(&self.requested))
            {
                if let Err(failure) = call_catching_panics(&case.body, ctx) {
                    report.failure(&case.name, &failure);
                }
            } else {
                report.skip(&case.name);
            }
            report.end_test(&case.name);
        }

        self.class
            .run_hook(HookKind::AfterAll, ctx)
            .map_err(|failure| hook_error(HookKind::AfterAll, failure))
    }
}
