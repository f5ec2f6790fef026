// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture test classes shared by the integration tests and the `testforge-fixture-harness`
//! binary.
//!
//! The harness links in [`fixture_registry`], so every class here can be run in a child process.
//! Integration tests write the matching class manifest with [`write_fixture_classes`].

use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;
use testforge_runner::{
    classes::{ClassRegistry, TestClass},
    creator::convention::TEST_CASE_CLASS,
    errors::TestFailure,
};

/// The property [`PROPERTY_TEST`] expects to be set to `hello world`.
pub const GREETING_PROPERTY: &str = "fixture.greeting";

/// The environment variable [`PROPERTY_TEST`] expects to be set to `forked`.
pub const MODE_ENV: &str = "FIXTURE_MODE";

/// Two passing convention tests.
pub const PASSING_TEST: &str = "fixtures.PassingTest";

/// One passing and one failing convention test.
pub const FAILING_TEST: &str = "fixtures.FailingTest";

/// Checks a property and an environment variable.
pub const PROPERTY_TEST: &str = "fixtures.env.PropertyTest";

/// An annotated test, only run by the `junit4` creator.
pub const ANNOTATED_TEST: &str = "fixtures.annotated.AnnotatedTest";

/// A test that sleeps for longer than any test timeout.
pub const SLOW_TEST: &str = "fixtures.slow.SlowTest";

/// Returns the registry of all fixture classes.
pub fn fixture_registry() -> ClassRegistry {
    [
        TestClass::builder(PASSING_TEST)
            .extends(TEST_CASE_CLASS)
            .test("testOne", |_| Ok(()))
            .test("testTwo", |_| Ok(()))
            .build(),
        TestClass::builder(FAILING_TEST)
            .extends(TEST_CASE_CLASS)
            .test("testPasses", |_| Ok(()))
            .test("testFails", |_| Err(TestFailure::assertion("1 != 2")))
            .build(),
        TestClass::builder(PROPERTY_TEST)
            .extends(TEST_CASE_CLASS)
            .test("testProperty", |ctx| {
                match ctx.property(GREETING_PROPERTY) {
                    Some("hello world") => Ok(()),
                    other => Err(TestFailure::assertion(format!(
                        "{GREETING_PROPERTY} is {other:?}"
                    ))),
                }
            })
            .test("testEnvironment", |_| {
                match std::env::var(MODE_ENV).as_deref() {
                    Ok("forked") => Ok(()),
                    other => Err(TestFailure::assertion(format!("{MODE_ENV} is {other:?}"))),
                }
            })
            .build(),
        TestClass::builder(ANNOTATED_TEST)
            .annotated_test("checksSum", |_| Ok(()))
            .build(),
        TestClass::builder(SLOW_TEST)
            .extends(TEST_CASE_CLASS)
            .test("testSleeps", |_| {
                std::thread::sleep(Duration::from_secs(60));
                Ok(())
            })
            .build(),
    ]
    .into_iter()
    .collect()
}

/// Writes the class manifest of every fixture class into `dir`.
pub fn write_fixture_classes(dir: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    fixture_registry().write_manifest(dir)
}
