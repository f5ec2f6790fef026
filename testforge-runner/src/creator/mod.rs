// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning loaded classes into runnable test sets.
//!
//! A [`TestSetCreator`] decides whether a class is a test unit, and if so how to run it. Two
//! families are built in:
//!
//! * [`convention`] (registered as `junit`): suites come from a static suite factory, or from the
//!   `test*` methods of classes assignable to `TestCase`. Group markers select what runs.
//! * [`annotated`] (registered as `junit4`): every class with annotated test methods is a test
//!   unit, run through a [`RunListener`](annotated::RunListener).
//!
//! Creators are resolved by name or by [`Invocation`](testforge_metadata::Invocation) through a
//! [`TestSetCreatorFactory`].

pub mod annotated;
pub mod convention;
mod factory;

pub use factory::*;

use crate::{
    classes::{GroupMarker, TestClass},
    context::TestContext,
    errors::SuiteError,
    report::TestReport,
};
use std::{fmt, sync::Arc};
use testforge_metadata::Invocation;

/// One discovered, runnable test unit.
///
/// Test sets are created fresh for every run and run once.
pub trait TestSet: fmt::Debug {
    /// Returns the name of the test set. Names are unique within a run.
    fn name(&self) -> &str;

    /// Returns the class the test set was created from.
    fn test_class(&self) -> &Arc<TestClass>;

    /// Returns the test set's group marker, if any.
    fn groups(&self) -> Option<&GroupMarker>;

    /// Runs the test set, reporting per-test events to `report`.
    ///
    /// The caller brackets this with [`TestReport::start_suite`] and [`TestReport::end_suite`].
    /// Test failures are reported, not returned; an error means the suite failed outside the
    /// per-test harness.
    fn run(&self, report: &mut dyn TestReport, ctx: &TestContext) -> Result<(), SuiteError>;
}

/// A strategy for turning loaded classes into test sets.
pub trait TestSetCreator: fmt::Debug {
    /// Returns the name this creator is registered under.
    fn name(&self) -> &str;

    /// Returns the base type that every candidate class must be assignable to.
    fn test_class(&self) -> &str;

    /// Creates a test set out of `class`, or returns `None` if the class is not a test unit for
    /// this creator.
    fn create_test_set(&self, class: &Arc<TestClass>) -> Option<Box<dyn TestSet>>;
}

/// Parameters shared by the built-in creators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreatorParams {
    /// The groups requested for this run. Empty means no group filtering.
    pub groups: Vec<String>,

    /// If set, only this test method runs.
    pub single_test: Option<String>,
}

impl CreatorParams {
    /// Returns an invocation that recreates a built-in creator named `target` with these
    /// parameters.
    pub fn to_invocation(&self, target: &str) -> Invocation {
        Invocation::new(target)
            .with_arg(self.groups.clone())
            .with_arg(self.single_test.clone().unwrap_or_default())
    }
}
