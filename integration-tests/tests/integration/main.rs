// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that launch the `testforge-fixture-harness` binary as a child process.

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use integration_tests::{
    ANNOTATED_TEST, FAILING_TEST, GREETING_PROPERTY, MODE_ENV, PASSING_TEST, PROPERTY_TEST,
    SLOW_TEST, fixture_registry, write_fixture_classes,
};
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};
use testforge_metadata::TestExitCode;
use testforge_runner::{
    config::TestModuleConfig,
    errors::LaunchError,
    launcher::{ChildCommand, TestLauncher},
    report::{JunitReport, ReportKind},
    runner::ExitClass,
};

const HARNESS: &str = env!("CARGO_BIN_EXE_testforge-fixture-harness");

struct TempModule {
    dir: Utf8TempDir,
}

impl TempModule {
    fn new() -> Self {
        let dir = camino_tempfile::tempdir().unwrap();
        write_fixture_classes(&dir.path().join("test-classes")).unwrap();
        Self { dir }
    }

    fn test_classes_dir(&self) -> Utf8PathBuf {
        self.dir.path().join("test-classes")
    }

    fn output_dir(&self) -> Utf8PathBuf {
        self.dir.path().join("reports")
    }

    /// Returns a forked config including only the named classes.
    fn config(&self, classes: &[&str]) -> TestModuleConfig {
        let mut config = TestModuleConfig::default();
        config.fork = true;
        config.includes = classes.iter().map(|class| include_for(class)).collect();
        config.reports = vec![ReportKind::Junit];
        config.paths.test_classes_dir = self.test_classes_dir();
        config.paths.output_dir = self.output_dir();
        config
    }

    fn launch(&self, config: TestModuleConfig) -> Result<ExitClass, LaunchError> {
        TestLauncher::new(config, Arc::new(fixture_registry()))
            .with_program(HARNESS)
            .launch()
    }

    fn has_junit_report(&self, suite: &str) -> bool {
        JunitReport::suite_path(&self.output_dir(), suite).is_file()
    }
}

fn include_for(class: &str) -> String {
    format!("{}.class", class.replace('.', "/"))
}

#[test]
fn forked_passing_run() {
    let module = TempModule::new();
    let exit = module.launch(module.config(&[PASSING_TEST])).unwrap();

    assert_eq!(exit, ExitClass::Ok);
    assert!(module.has_junit_report(PASSING_TEST));
    assert!(!module.has_junit_report(FAILING_TEST));
}

#[test]
fn forked_failing_run() {
    let module = TempModule::new();
    let mut config = module.config(&[PASSING_TEST, FAILING_TEST]);

    let exit = module.launch(config.clone()).unwrap();
    assert_eq!(exit, ExitClass::Failure, "failures are warnings by default");

    config.fail_on_error = true;
    let err = module.launch(config).unwrap_err();
    match err {
        LaunchError::TestsFailed {
            exit_class,
            report_dir,
        } => {
            assert_eq!(exit_class, ExitClass::Failure);
            assert_eq!(report_dir, module.output_dir());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn forked_properties_and_environment() {
    let module = TempModule::new();
    let mut config = module.config(&[PROPERTY_TEST]);
    config.fail_on_error = true;
    config.properties.insert(
        GREETING_PROPERTY.to_owned(),
        "hello ${FIXTURE_WHO}".to_owned(),
    );
    config.env.insert(MODE_ENV.to_owned(), "forked".to_owned());
    config.env.insert("FIXTURE_WHO".to_owned(), "world".to_owned());

    assert_eq!(module.launch(config).unwrap(), ExitClass::Ok);
}

#[test]
fn forked_annotated_creator() {
    let module = TempModule::new();
    let mut config = module.config(&[ANNOTATED_TEST, PASSING_TEST]);
    config.test_type = Some("junit4".to_owned());

    assert_eq!(module.launch(config).unwrap(), ExitClass::Ok);
    assert!(module.has_junit_report(ANNOTATED_TEST));
    assert!(
        !module.has_junit_report(PASSING_TEST),
        "convention tests are not annotated tests"
    );
}

#[test]
fn forked_empty_run() {
    let module = TempModule::new();
    let mut config = module.config(&["fixtures.Missing"]);
    assert_eq!(module.launch(config.clone()).unwrap(), ExitClass::Ok);

    config.fail_if_empty = true;
    let err = module.launch(config).unwrap_err();
    assert!(
        matches!(&err, LaunchError::NoTests { test_classes_dir }
            if *test_classes_dir == module.test_classes_dir()),
        "{err:?}"
    );
}

#[test]
fn fork_per_suite_run() {
    let module = TempModule::new();
    let mut config = module.config(&[PASSING_TEST, FAILING_TEST]);
    config.fork_per_suite = true;

    let exit = module.launch(config).unwrap();
    assert_eq!(exit, ExitClass::Failure);
    assert!(module.has_junit_report(PASSING_TEST));
    assert!(module.has_junit_report(FAILING_TEST));
}

#[test]
fn fork_per_suite_empty_run() {
    let module = TempModule::new();
    let mut config = module.config(&["fixtures.Missing"]);
    config.fork_per_suite = true;
    config.fail_if_empty = true;

    let err = module.launch(config).unwrap_err();
    assert!(matches!(err, LaunchError::NoTests { .. }), "{err:?}");
}

#[test]
fn child_timeout_is_an_error() {
    let module = TempModule::new();
    let mut config = module.config(&[SLOW_TEST]);
    config.timeout = Some(Duration::from_secs(2));

    assert_eq!(module.launch(config).unwrap(), ExitClass::Error);
}

#[test]
fn child_exit_codes() {
    let module = TempModule::new();
    let test_classes_dir = module.test_classes_dir();
    let run = |args: &[&str]| {
        let mut command = ChildCommand::new(HARNESS);
        command
            .args(["-c", test_classes_dir.as_str(), "-r", "junit", "-o"])
            .arg(module.output_dir().as_str())
            .args(args.iter().copied())
            .arg(test_classes_dir.as_str());
        command.execute().unwrap()
    };

    assert_eq!(run(&["-i", &include_for(PASSING_TEST)]), ExitClass::Ok);
    assert_eq!(run(&["-s", FAILING_TEST]), ExitClass::Failure);
    assert_eq!(run(&["-f", "-i", "nothing/**"]), ExitClass::NoTests);
    assert_eq!(run(&["-t", "testng"]), ExitClass::Error);
    assert_eq!(ExitClass::NoTests.code(), TestExitCode::NO_TESTS);
}

#[test]
fn include_paths() {
    assert_eq!(include_for(PASSING_TEST), "fixtures/PassingTest.class");
    assert!(Utf8Path::new(&include_for(PROPERTY_TEST)).starts_with("fixtures/env"));
}
