// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-process test engine.
//!
//! A [`TestRunner`] scans a test classes directory for class markers, loads each class through a
//! [`ClassLoader`], asks a [`TestSetCreator`] to turn it into a [`TestSet`], and runs the test sets
//! one after another against a [`TestReport`].

use crate::{
    classes::{ClassLoader, TestClass},
    context::TestContext,
    creator::{TestSet, TestSetCreator},
    errors::{ClassLoadError, DisplayErrorChain, RunnerError, SuiteError, TestFailure},
    helpers::{CLASS_EXTENSION, class_name_from_path, plural},
    report::TestReport,
    scanner::DirectoryScanner,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use testforge_metadata::TestExitCode;
use tracing::{debug, error, info};

/// The outcome of a run, as seen by the process that started it.
///
/// Classes are ordered by severity: `Ok < NoTests < Failure < Error`. Aggregating several
/// outcomes keeps the worst one; see [`ExitClass::worse`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum ExitClass {
    /// No suites failed.
    Ok,

    /// No suites ran, and the run was configured to fail in that case.
    NoTests,

    /// One or more suites failed.
    Failure,

    /// An infrastructure error occurred.
    Error,
}

impl ExitClass {
    /// Returns the process exit code for this class.
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => TestExitCode::OK,
            Self::NoTests => TestExitCode::NO_TESTS,
            Self::Failure => TestExitCode::FAILURE,
            Self::Error => TestExitCode::ERROR,
        }
    }

    /// Maps an exit code observed from a child process back to a class.
    ///
    /// Codes that aren't documented exit codes, such as a panic's exit code, map to `Error`.
    pub fn from_code(code: i32) -> Self {
        match TestExitCode::normalize(code) {
            Some(TestExitCode::OK) => Self::Ok,
            Some(TestExitCode::NO_TESTS) => Self::NoTests,
            Some(TestExitCode::FAILURE) => Self::Failure,
            _ => Self::Error,
        }
    }

    /// Maps a child's exit status to a class. A child killed by a signal has no exit code and
    /// maps to `Error`.
    pub fn from_status(code: Option<i32>) -> Self {
        code.map_or(Self::Error, Self::from_code)
    }

    fn severity(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::NoTests => 1,
            Self::Failure => 2,
            Self::Error => 3,
        }
    }

    /// Returns the more severe of `self` and `other`.
    pub fn worse(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Describes this class in a sentence like "tests failed".
    pub fn describe(self) -> &'static str {
        match self {
            Self::Ok => "passed",
            Self::NoTests => "were not found",
            Self::Failure => "failed",
            Self::Error => "errored",
        }
    }
}

/// A test set found by a listing pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListedTestSet {
    /// The name of the test set.
    pub name: String,

    /// The name of the class it was created from. This is the suite selector used to run it on
    /// its own.
    pub class_name: String,
}

/// Builds a [`TestRunner`].
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    test_classes_dir: Utf8PathBuf,
    includes: Vec<String>,
    excludes: Vec<String>,
    follow_symlinks: bool,
    fail_if_empty: bool,
    output_dir: Option<Utf8PathBuf>,
}

impl TestRunnerBuilder {
    /// Creates a new builder for a runner over `test_classes_dir`.
    pub fn new(test_classes_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            test_classes_dir: test_classes_dir.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            follow_symlinks: true,
            fail_if_empty: false,
            output_dir: None,
        }
    }

    /// Sets the include patterns. An empty list includes every file.
    pub fn set_includes(
        &mut self,
        includes: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.includes = includes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the exclude patterns.
    pub fn set_excludes(
        &mut self,
        excludes: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether symbolic links are followed while scanning. Defaults to true.
    pub fn set_follow_symlinks(&mut self, follow_symlinks: bool) -> &mut Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// Sets whether a run in which no suites ran is classified as [`ExitClass::NoTests`].
    pub fn set_fail_if_empty(&mut self, fail_if_empty: bool) -> &mut Self {
        self.fail_if_empty = fail_if_empty;
        self
    }

    /// Sets the directory reports are written to. Defaults to the test classes directory.
    pub fn set_output_dir(&mut self, output_dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Creates the runner.
    pub fn build(&self) -> TestRunner {
        TestRunner {
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| self.test_classes_dir.clone()),
            test_classes_dir: self.test_classes_dir.clone(),
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            follow_symlinks: self.follow_symlinks,
            fail_if_empty: self.fail_if_empty,
        }
    }
}

/// Runs the test sets found in a test classes directory.
#[derive(Clone, Debug)]
pub struct TestRunner {
    test_classes_dir: Utf8PathBuf,
    includes: Vec<String>,
    excludes: Vec<String>,
    follow_symlinks: bool,
    fail_if_empty: bool,
    output_dir: Utf8PathBuf,
}

#[derive(Clone, Copy, Debug)]
struct SuiteCounts {
    run: usize,
    failed: usize,
}

impl SuiteCounts {
    fn of(report: &dyn TestReport) -> Self {
        Self {
            run: report.suites_run(),
            failed: report.suites_failed(),
        }
    }
}

impl TestRunner {
    /// Returns the test classes directory.
    pub fn test_classes_dir(&self) -> &Utf8Path {
        &self.test_classes_dir
    }

    /// Returns the report output directory.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Discovers and runs every test set, bracketing the whole run with
    /// [`TestReport::start_run`] and [`TestReport::stop_run`].
    ///
    /// A suite that fails outside the per-test harness is logged and recorded as errored, and the
    /// run moves on to the next suite. Only failures to discover tests or to write the report are
    /// returned as errors.
    pub fn run(
        &self,
        creator: &dyn TestSetCreator,
        report: &mut dyn TestReport,
        loader: &ClassLoader,
        ctx: &TestContext,
    ) -> Result<ExitClass, RunnerError> {
        let test_sets = self.discover(creator, loader)?;

        report.init(&self.output_dir)?;
        let before = SuiteCounts::of(report);
        info!(
            "running {} {} from {}",
            test_sets.len(),
            plural::suites_str(test_sets.len()),
            self.test_classes_dir,
        );
        report.start_run(test_sets.len());
        for test_set in test_sets.values() {
            execute(test_set.as_ref(), report, ctx)?;
        }
        report.stop_run()?;

        Ok(self.classify(before, SuiteCounts::of(report)))
    }

    /// Runs the single test set created from the class named by `selector`, without starting or
    /// stopping the run.
    ///
    /// `selector` is either a class name (`a.b.C`) or a class marker path relative to the test
    /// classes directory (`a/b/C.class`). If the creator declines the class, nothing runs.
    pub fn run_one(
        &self,
        selector: &str,
        creator: &dyn TestSetCreator,
        report: &mut dyn TestReport,
        loader: &ClassLoader,
        ctx: &TestContext,
    ) -> Result<ExitClass, RunnerError> {
        let class_name = selector_to_class_name(selector)?;
        let class = loader.load_class(&class_name)?;
        let test_set = self.create(creator, &class)?;

        report.init(&self.output_dir)?;
        let before = SuiteCounts::of(report);
        match &test_set {
            Some(test_set) => execute(test_set.as_ref(), report, ctx)?,
            None => info!("{class_name} is not a test for creator `{}`", creator.name()),
        }

        Ok(self.classify(before, SuiteCounts::of(report)))
    }

    /// Discovers every test set without running any of them.
    pub fn list_test_sets(
        &self,
        creator: &dyn TestSetCreator,
        loader: &ClassLoader,
    ) -> Result<Vec<ListedTestSet>, RunnerError> {
        Ok(self
            .discover(creator, loader)?
            .into_iter()
            .map(|(name, test_set)| ListedTestSet {
                name,
                class_name: test_set.test_class().name().to_owned(),
            })
            .collect())
    }

    fn discover(
        &self,
        creator: &dyn TestSetCreator,
        loader: &ClassLoader,
    ) -> Result<IndexMap<String, Box<dyn TestSet>>, RunnerError> {
        let mut scanner =
            DirectoryScanner::new(&self.test_classes_dir, &self.includes, &self.excludes)?;
        scanner.follow_symlinks(self.follow_symlinks);
        let paths = scanner.scan()?;

        let mut test_sets: IndexMap<String, Box<dyn TestSet>> = IndexMap::new();
        for path in paths {
            let class_name = class_name_from_path(path.as_str())
                .ok_or(ClassLoadError::NotAClassFile { path })?;
            let class = loader.load_class(&class_name)?;
            let Some(test_set) = self.create(creator, &class)? else {
                continue;
            };

            let name = test_set.name().to_owned();
            if let Some(existing) = test_sets.get(&name) {
                return Err(RunnerError::DuplicateTestSet {
                    name,
                    first: existing.test_class().name().to_owned(),
                    second: class_name,
                });
            }
            debug!("discovered test set {name}");
            test_sets.insert(name, test_set);
        }

        Ok(test_sets)
    }

    fn create(
        &self,
        creator: &dyn TestSetCreator,
        class: &Arc<TestClass>,
    ) -> Result<Option<Box<dyn TestSet>>, RunnerError> {
        if class.is_abstract() {
            debug!("skipping abstract class {}", class.name());
            return Ok(None);
        }
        if !class.is_assignable_to(creator.test_class()) {
            return Err(RunnerError::NotAssignable {
                class_name: class.name().to_owned(),
                expected: creator.test_class().to_owned(),
            });
        }
        Ok(creator.create_test_set(class))
    }

    fn classify(&self, before: SuiteCounts, after: SuiteCounts) -> ExitClass {
        let run = after.run - before.run;
        let failed = after.failed - before.failed;
        if self.fail_if_empty && run == 0 {
            ExitClass::NoTests
        } else if failed == 0 {
            ExitClass::Ok
        } else {
            ExitClass::Failure
        }
    }
}

fn execute(
    test_set: &dyn TestSet,
    report: &mut dyn TestReport,
    ctx: &TestContext,
) -> Result<(), RunnerError> {
    let name = test_set.name();
    report.start_suite(name);

    let result = catch_unwind(AssertUnwindSafe(|| test_set.run(&mut *report, ctx)))
        .unwrap_or_else(|payload| {
            Err(SuiteError::Panicked {
                name: name.to_owned(),
                failure: TestFailure::from_panic(&*payload),
            })
        });
    if let Err(err) = result {
        error!("suite {name} failed: {}", DisplayErrorChain::new(&err));
        report.suite_error(name, &err);
    }

    report.end_suite()?;
    Ok(())
}

fn selector_to_class_name(selector: &str) -> Result<String, ClassLoadError> {
    if Utf8Path::new(selector).extension() == Some(CLASS_EXTENSION) {
        class_name_from_path(selector).ok_or_else(|| ClassLoadError::NotAClassFile {
            path: selector.into(),
        })
    } else {
        Ok(selector.to_owned())
    }
}
