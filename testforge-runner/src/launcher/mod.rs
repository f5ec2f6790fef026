// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a test module, either in-process or in child processes.
//!
//! A [`TestLauncher`] picks a [`LaunchMode`] from the module config:
//!
//! * [`LaunchMode::InProcess`] runs a [`TestRunner`] directly.
//! * [`LaunchMode::Forked`] spawns one child running the [`entry`](crate::entry) protocol for the
//!   whole module.
//! * [`LaunchMode::ForkPerSuite`] lists test sets in-process, then spawns one child per test set.
//!   The report travels between processes through a report spec file.

mod command;
mod coverage;

pub use command::*;
pub use coverage::*;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        #[path = "unix.rs"]
        mod unix;
        use unix as os;
    } else if #[cfg(windows)] {
        #[path = "windows.rs"]
        mod windows;
        use windows as os;
    } else {
        compile_error!("unsupported target platform");
    }
}

use crate::{
    classes::{ClassLoader, ClassRegistry},
    config::{LaunchMode, TestModuleConfig},
    context::{PropertyOverlay, TestContext},
    creator::{TestSetCreator, TestSetCreatorFactory},
    errors::{CreatorError, LaunchError},
    helpers::{escape_property_sigil, expand_property_values, join_list, plural},
    report::{Report, TestReport, read_report_spec, write_report_spec},
    runner::{ExitClass, TestRunner, TestRunnerBuilder},
};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::NamedUtf8TempFile;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The name of the directory, under the report output directory, that coverage profiles are
/// collected into.
pub const COVERAGE_DIR_NAME: &str = "coverage";

/// Which test sets a child process runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChildSelection<'a> {
    /// Every test set matched by the include and exclude patterns.
    All,

    /// Only the test set created from this class.
    Suite(&'a str),
}

/// Runs the tests of one module according to its config.
#[derive(Debug)]
pub struct TestLauncher {
    config: TestModuleConfig,
    registry: Arc<ClassRegistry>,
    factory: TestSetCreatorFactory,
    program: Option<Utf8PathBuf>,
    coverage: Option<Box<dyn Coverage>>,
}

impl TestLauncher {
    /// Creates a launcher with the built-in test set creators.
    ///
    /// If the config enables coverage, profiles are collected with [`LlvmCoverage`] into the
    /// [`COVERAGE_DIR_NAME`] directory under the report output directory.
    pub fn new(config: TestModuleConfig, registry: Arc<ClassRegistry>) -> Self {
        let coverage = config.coverage.then(|| {
            Box::new(LlvmCoverage::new(
                config.paths.output_dir.join(COVERAGE_DIR_NAME),
            )) as Box<dyn Coverage>
        });
        Self {
            config,
            registry,
            factory: TestSetCreatorFactory::with_builtins(),
            program: None,
            coverage,
        }
    }

    /// Replaces the test set creator factory.
    pub fn with_factory(mut self, factory: TestSetCreatorFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Sets the program that child processes run. Defaults to the current executable.
    ///
    /// The program must call [`entry::main`](crate::entry::main) with the same class registry.
    pub fn with_program(mut self, program: impl Into<Utf8PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Replaces the coverage session.
    pub fn with_coverage(mut self, coverage: Option<Box<dyn Coverage>>) -> Self {
        self.coverage = coverage;
        self
    }

    /// Returns the config.
    pub fn config(&self) -> &TestModuleConfig {
        &self.config
    }

    /// Runs the module's tests and applies the result policy.
    ///
    /// Returns the overall exit classification if it is acceptable under the config. Otherwise,
    /// returns [`LaunchError::NoTests`] (with `fail-if-empty`) or [`LaunchError::TestsFailed`]
    /// (with `fail-on-error`). Failures that are not errors under the config are logged as
    /// warnings.
    pub fn launch(&mut self) -> Result<ExitClass, LaunchError> {
        let mode = self.config.launch_mode();
        debug!("launching tests in {mode:?} mode");

        let exit_class = match mode {
            LaunchMode::InProcess => self.run_in_process()?,
            LaunchMode::Forked => self.run_forked_guarded(|this| this.run_forked())?,
            LaunchMode::ForkPerSuite => self.run_forked_guarded(|this| this.run_fork_per_suite())?,
        };
        self.apply_result_policy(exit_class)
    }

    fn apply_result_policy(&self, exit_class: ExitClass) -> Result<ExitClass, LaunchError> {
        match exit_class {
            ExitClass::Ok => Ok(exit_class),
            ExitClass::NoTests => {
                if self.config.fail_if_empty {
                    Err(LaunchError::NoTests {
                        test_classes_dir: self.config.paths.test_classes_dir.clone(),
                    })
                } else {
                    Ok(exit_class)
                }
            }
            ExitClass::Failure | ExitClass::Error => {
                if self.config.fail_on_error {
                    Err(LaunchError::TestsFailed {
                        exit_class,
                        report_dir: self.config.paths.output_dir.clone(),
                    })
                } else {
                    warn!(
                        "tests {}, see reports in `{}`",
                        exit_class.describe(),
                        self.config.paths.output_dir,
                    );
                    Ok(exit_class)
                }
            }
        }
    }

    fn run_in_process(&self) -> Result<ExitClass, LaunchError> {
        let creator = self.creator()?;
        let loader = self.loader();
        let mut report = Report::from_kinds(&self.config.reports);

        let properties = expand_property_values(&self.config.properties);
        let _overlay = PropertyOverlay::apply(properties.clone());
        let ctx = TestContext::new(properties, loader.default_assertion_status());

        Ok(self
            .runner()
            .run(creator.as_ref(), &mut report, &loader, &ctx)?)
    }

    /// Runs `f`, then stops the coverage session whether or not `f` succeeded.
    fn run_forked_guarded(
        &mut self,
        f: impl FnOnce(&Self) -> Result<ExitClass, LaunchError>,
    ) -> Result<ExitClass, LaunchError> {
        let result = f(&*self);
        let stopped = match &mut self.coverage {
            Some(coverage) => coverage.stop_run(),
            None => Ok(()),
        };
        let exit_class = result?;
        stopped?;
        Ok(exit_class)
    }

    fn run_forked(&self) -> Result<ExitClass, LaunchError> {
        let report = Report::from_kinds(&self.config.reports);
        let spec_file = report_spec_file()?;
        write_report_spec(spec_file.path(), &report)?;

        let command = self.child_command(ChildSelection::All, spec_file.path())?;
        info!(
            "running tests from {} in a child process",
            self.config.paths.test_classes_dir
        );
        command.execute()
    }

    fn run_fork_per_suite(&self) -> Result<ExitClass, LaunchError> {
        let creator = self.creator()?;
        let runner = self.runner();
        let test_sets = runner.list_test_sets(creator.as_ref(), &self.loader())?;

        let mut report = Report::from_kinds(&self.config.reports);
        report.init(runner.output_dir())?;
        report.start_run(test_sets.len());
        let spec_file = report_spec_file()?;
        write_report_spec(spec_file.path(), &report)?;

        info!(
            "running {} {} from {}, each in its own child process",
            test_sets.len(),
            plural::suites_str(test_sets.len()),
            self.config.paths.test_classes_dir,
        );
        let mut exit_class = ExitClass::Ok;
        for test_set in &test_sets {
            let command =
                self.child_command(ChildSelection::Suite(&test_set.class_name), spec_file.path())?;
            let child_exit = command.execute()?;
            debug!("test set {} finished: {child_exit:?}", test_set.name);
            exit_class = exit_class.worse(child_exit);
        }

        let mut report = read_report_spec(spec_file.path())?;
        report.init(runner.output_dir())?;
        report.stop_run()?;

        if self.config.fail_if_empty && report.suites_run() == 0 {
            exit_class = exit_class.worse(ExitClass::NoTests);
        }
        Ok(exit_class)
    }

    /// Assembles the command for a child process.
    ///
    /// The arguments after the properties are, in order: coverage arguments, `-v`, `-f`, either
    /// `-i`/`-e` or `-s`, `-c`, `--single-test`, `-g`, `-o`, `--creator` or `-t`,
    /// `--report-specs-file`, and finally the test classes directory. Every argument except
    /// property values is escaped against property expansion in the child.
    pub fn child_command(
        &self,
        selection: ChildSelection<'_>,
        report_spec_file: &Utf8Path,
    ) -> Result<ChildCommand, LaunchError> {
        let config = &self.config;
        let default_program = self.child_program()?;
        let mut command = ChildCommand::new(&default_program);
        if let Some(coverage) = &self.coverage {
            coverage.add_command_line_arguments(&mut command);
            command.set_program(coverage.runner_program(&default_program));
        }

        let mut args = Vec::new();
        if config.verbose {
            args.push("-v".to_owned());
        }
        if config.fail_if_empty {
            args.push("-f".to_owned());
        }
        match selection {
            ChildSelection::All => {
                if !config.includes.is_empty() {
                    args.extend(["-i".to_owned(), join_list(&config.includes)]);
                }
                if !config.excludes.is_empty() {
                    args.extend(["-e".to_owned(), join_list(&config.excludes)]);
                }
            }
            ChildSelection::Suite(class_name) => {
                args.extend(["-s".to_owned(), class_name.to_owned()]);
            }
        }
        args.extend([
            "-c".to_owned(),
            join_classpath(&config.paths.loader_classpath())?,
        ]);
        if let Some(single_test) = &config.single_test {
            args.extend(["--single-test".to_owned(), single_test.clone()]);
        }
        if !config.groups.is_empty() {
            args.extend(["-g".to_owned(), join_list(&config.groups)]);
        }
        args.extend(["-o".to_owned(), config.paths.output_dir.to_string()]);
        match (&config.creator, &config.test_type) {
            (Some(invocation), _) => args.extend(["--creator".to_owned(), invocation.to_arg()]),
            (None, Some(test_type)) => args.extend(["-t".to_owned(), test_type.clone()]),
            (None, None) => {}
        }
        args.extend([
            "--report-specs-file".to_owned(),
            report_spec_file.to_string(),
            config.paths.test_classes_dir.to_string(),
        ]);

        command
            .args(args.iter().map(|arg| escape_property_sigil(arg).into_owned()))
            .classpath(config.paths.system_classpath.iter().cloned())
            .properties(config.properties.clone())
            .env(config.env.clone())
            .current_dir(config.working_dir.clone())
            .max_memory(config.max_memory)
            .enable_assertions(config.enable_assertions)
            .timeout(config.timeout)
            .debugger(config.debugger.as_deref())?;
        Ok(command)
    }

    fn child_program(&self) -> Result<Utf8PathBuf, LaunchError> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => {
                let exe = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
                Utf8PathBuf::try_from(exe).map_err(LaunchError::NonUtf8Path)
            }
        }
    }

    fn creator(&self) -> Result<Box<dyn TestSetCreator>, CreatorError> {
        self.factory.resolve(
            self.config.creator.as_ref(),
            self.config.test_type.as_deref(),
            &self.config.creator_params(),
        )
    }

    fn loader(&self) -> ClassLoader {
        let root = ClassLoader::root(
            self.registry.clone(),
            self.config.paths.system_classpath.iter().cloned(),
        );
        let mut loader = ClassLoader::new(root, self.config.paths.loader_classpath());
        loader.set_default_assertion_status(self.config.enable_assertions);
        loader
    }

    fn runner(&self) -> TestRunner {
        TestRunnerBuilder::new(&self.config.paths.test_classes_dir)
            .set_includes(self.config.includes.iter().cloned())
            .set_excludes(self.config.excludes.iter().cloned())
            .set_fail_if_empty(self.config.fail_if_empty)
            .set_output_dir(&self.config.paths.output_dir)
            .build()
    }
}

fn report_spec_file() -> Result<NamedUtf8TempFile, LaunchError> {
    camino_tempfile::Builder::new()
        .prefix("testforge-report-")
        .suffix(".json")
        .tempfile()
        .map_err(LaunchError::TempFile)
}

fn join_classpath(classpath: &[Utf8PathBuf]) -> Result<String, LaunchError> {
    let joined = std::env::join_paths(classpath).map_err(LaunchError::JoinClasspath)?;
    // Joined UTF-8 paths are UTF-8.
    Ok(joined.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classes::TestClass,
        context::system_property,
        creator::convention::TEST_CASE_CLASS,
        errors::TestFailure,
        report::{JunitReport, ReportKind},
    };
    use camino_tempfile::Utf8TempDir;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use testforge_metadata::{Invocation, InvocationArg};

    struct Module {
        dir: Utf8TempDir,
        registry: Arc<ClassRegistry>,
    }

    impl Module {
        fn new(classes: impl IntoIterator<Item = Arc<TestClass>>) -> Self {
            let registry: ClassRegistry = classes.into_iter().collect();
            let dir = camino_tempfile::tempdir().unwrap();
            registry
                .write_manifest(&dir.path().join("test-classes"))
                .unwrap();
            Self {
                dir,
                registry: Arc::new(registry),
            }
        }

        fn config(&self) -> TestModuleConfig {
            let mut config = TestModuleConfig::default();
            config.paths.test_classes_dir = self.dir.path().join("test-classes");
            config.paths.output_dir = self.dir.path().join("reports");
            config.reports = vec![ReportKind::Junit];
            config
        }

        fn launcher(&self, config: TestModuleConfig) -> TestLauncher {
            TestLauncher::new(config, self.registry.clone()).with_program("/bin/harness")
        }
    }

    fn test_case_class(name: &str, passes: bool) -> Arc<TestClass> {
        TestClass::builder(name)
            .extends(TEST_CASE_CLASS)
            .test("testIt", move |_| {
                if passes {
                    Ok(())
                } else {
                    Err(TestFailure::assertion("expected to pass"))
                }
            })
            .build()
    }

    #[test]
    fn in_process_overlays_properties() {
        let class = TestClass::builder("a.PropertyTest")
            .extends(TEST_CASE_CLASS)
            .test("testProperties", |ctx| {
                let from_ctx = ctx.property("launcher.greeting").map(str::to_owned);
                let ambient = system_property("launcher.greeting");
                if from_ctx.as_deref() == Some("hello world") && ambient == from_ctx {
                    Ok(())
                } else {
                    Err(TestFailure::assertion(format!(
                        "unexpected properties: {from_ctx:?}, {ambient:?}"
                    )))
                }
            })
            .build();
        let module = Module::new([class]);
        let mut config = module.config();
        config.properties = btreemap! {
            "launcher.greeting".to_owned() => "hello ${launcher.who}".to_owned(),
            "launcher.who".to_owned() => "world".to_owned(),
        };

        let exit = module.launcher(config).launch().unwrap();
        assert_eq!(exit, ExitClass::Ok);
        assert_eq!(
            system_property("launcher.greeting"),
            None,
            "properties are restored after the run"
        );
        assert!(
            JunitReport::suite_path(&module.dir.path().join("reports"), "a.PropertyTest").is_file()
        );
    }

    #[test_case(false, false, Ok(ExitClass::Failure); "failure downgraded")]
    #[test_case(false, true, Err(ExitClass::Failure); "failure is fatal")]
    #[test_case(true, false, Ok(ExitClass::Failure); "fail if empty does not affect failures")]
    fn result_policy_for_failures(
        fail_if_empty: bool,
        fail_on_error: bool,
        expected: Result<ExitClass, ExitClass>,
    ) {
        let module = Module::new([test_case_class("a.FailingTest", false)]);
        let mut config = module.config();
        config.fail_if_empty = fail_if_empty;
        config.fail_on_error = fail_on_error;

        let result = module.launcher(config).launch();
        match (result, expected) {
            (Ok(actual), Ok(expected)) => assert_eq!(actual, expected),
            (Err(LaunchError::TestsFailed { exit_class, report_dir }), Err(expected)) => {
                assert_eq!(exit_class, expected);
                assert_eq!(report_dir, module.dir.path().join("reports"));
            }
            (result, expected) => panic!("expected {expected:?}, got {result:?}"),
        }
    }

    #[test]
    fn result_policy_for_empty_runs() {
        let module = Module::new([test_case_class("a.PassingTest", true)]);
        let mut config = module.config();
        config.includes = vec!["**/Missing*.class".to_owned()];

        let exit = module.launcher(config.clone()).launch().unwrap();
        assert_eq!(exit, ExitClass::Ok, "empty runs pass without fail-if-empty");

        config.fail_if_empty = true;
        let err = module.launcher(config).launch().unwrap_err();
        assert!(
            matches!(&err, LaunchError::NoTests { test_classes_dir }
                if *test_classes_dir == module.dir.path().join("test-classes")),
            "{err:?}"
        );
    }

    #[test]
    fn empty_module_in_process() {
        let module = Module::new(Vec::<Arc<TestClass>>::new());
        let mut config = module.config();
        assert_eq!(config.launch_mode(), LaunchMode::InProcess);

        let exit = module.launcher(config.clone()).launch().unwrap();
        assert_eq!(exit, ExitClass::Ok);

        config.fail_if_empty = true;
        let err = module.launcher(config).launch().unwrap_err();
        assert!(matches!(err, LaunchError::NoTests { .. }), "{err:?}");
    }

    #[test]
    fn whole_run_command_line() {
        let module = Module::new(Vec::<Arc<TestClass>>::new());
        let mut config = module.config();
        config.fork = true;
        config.verbose = true;
        config.fail_if_empty = true;
        config.includes = vec!["**/*Test.class".to_owned(), "**/*IT.class".to_owned()];
        config.excludes = vec!["**/Abstract*".to_owned()];
        config.groups = vec!["fast".to_owned()];
        config.test_type = Some("junit4".to_owned());
        config.paths.classpath = vec!["/lib/a".into()];
        config.properties.insert("cost".to_owned(), "$5 ${unit}".to_owned());

        let launcher = module.launcher(config);
        let command = launcher
            .child_command(ChildSelection::All, Utf8Path::new("/tmp/spec.json"))
            .unwrap();
        let test_classes = module.dir.path().join("test-classes");
        let output = module.dir.path().join("reports");
        let classpath = join_classpath(&[test_classes.clone(), "/lib/a".into()]).unwrap();

        assert_eq!(
            command.command_line(),
            [
                "/bin/harness",
                "-D",
                "cost=$5 ${unit}",
                "--enable-assertions",
                "-v",
                "-f",
                "-i",
                "**/*Test.class:**/*IT.class",
                "-e",
                "**/Abstract*",
                "-c",
                classpath.as_str(),
                "-g",
                "fast",
                "-o",
                output.as_str(),
                "-t",
                "junit4",
                "--report-specs-file",
                "/tmp/spec.json",
                test_classes.as_str(),
            ]
        );
    }

    #[test]
    fn suite_command_line_escapes_values() {
        let module = Module::new(Vec::<Arc<TestClass>>::new());
        let mut config = module.config();
        config.fork_per_suite = true;
        config.enable_assertions = false;
        config.single_test = Some("test$Inner".to_owned());
        config.creator = Some(
            Invocation::new("plugins.Creator").with_arg(InvocationArg::Str("${x}".to_owned())),
        );
        let launcher = module.launcher(config.clone());

        let command = launcher
            .child_command(
                ChildSelection::Suite("a.Outer$Inner"),
                Utf8Path::new("/tmp/spec.json"),
            )
            .unwrap();
        let argv = command.command_line();

        let selector = argv.iter().position(|arg| arg == "-s").unwrap();
        assert_eq!(argv[selector + 1], "a.Outer$$Inner");
        assert!(!argv.iter().any(|arg| arg == "-i"), "no patterns with a selector");
        assert!(!argv.iter().any(|arg| arg == "--enable-assertions"));

        let single_test = argv.iter().position(|arg| arg == "--single-test").unwrap();
        assert_eq!(argv[single_test + 1], "test$$Inner");

        let creator = argv.iter().position(|arg| arg == "--creator").unwrap();
        let invocation = config.creator.as_ref().unwrap().to_arg();
        assert_eq!(argv[creator + 1], escape_property_sigil(&invocation));
    }

    #[test]
    fn coverage_stops_when_children_cannot_start() {
        let module = Module::new([test_case_class("a.PassingTest", true)]);
        let mut config = module.config();
        config.coverage = true;
        assert_eq!(config.launch_mode(), LaunchMode::Forked);

        let mut launcher = TestLauncher::new(config, module.registry.clone())
            .with_program(module.dir.path().join("missing-harness"));
        let exit = launcher.launch().unwrap();
        assert_eq!(exit, ExitClass::Error);
        assert!(
            module
                .dir
                .path()
                .join("reports")
                .join(COVERAGE_DIR_NAME)
                .join(COVERAGE_INDEX_FILE)
                .is_file()
        );
    }

    /// Writes a child program that records its report spec file path into `record`.
    ///
    /// With `corrupt`, the child also overwrites the report spec file with invalid JSON.
    #[cfg(unix)]
    fn recording_child(dir: &Utf8Path, record: &Utf8Path, corrupt: bool) -> Utf8PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let corrupt = if corrupt {
            r#"echo "not json" > "$2""#
        } else {
            ""
        };
        let script = indoc::formatdoc! {r#"
            #!/bin/sh
            while [ $# -gt 0 ]; do
                if [ "$1" = "--report-specs-file" ]; then
                    echo "$2" >> "{record}"
                    {corrupt}
                fi
                shift
            done
        "#};
        let path = dir.join("recording-child.sh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn recorded_spec_files(record: &Utf8Path) -> Vec<Utf8PathBuf> {
        std::fs::read_to_string(record)
            .unwrap()
            .lines()
            .map(Utf8PathBuf::from)
            .collect()
    }

    #[cfg(unix)]
    #[test_case(false; "forked")]
    #[test_case(true; "fork per suite")]
    fn report_spec_file_is_removed(fork_per_suite: bool) {
        let module = Module::new([
            test_case_class("a.OneTest", true),
            test_case_class("a.TwoTest", true),
        ]);
        let record = module.dir.path().join("record.txt");
        let program = recording_child(module.dir.path(), &record, false);
        let mut config = module.config();
        config.fork = true;
        config.fork_per_suite = fork_per_suite;

        let exit = TestLauncher::new(config, module.registry.clone())
            .with_program(program)
            .launch()
            .unwrap();
        assert_eq!(exit, ExitClass::Ok);

        let spec_files = recorded_spec_files(&record);
        assert_eq!(spec_files.len(), if fork_per_suite { 2 } else { 1 });
        for spec_file in spec_files {
            assert!(!spec_file.exists(), "{spec_file} was not removed");
        }
    }

    #[cfg(unix)]
    #[test]
    fn report_spec_file_is_removed_on_error() {
        let module = Module::new([test_case_class("a.OneTest", true)]);
        let record = module.dir.path().join("record.txt");
        let program = recording_child(module.dir.path(), &record, true);
        let mut config = module.config();
        config.fork_per_suite = true;

        let err = TestLauncher::new(config, module.registry.clone())
            .with_program(program)
            .launch()
            .unwrap_err();
        assert!(matches!(err, LaunchError::ReportSpec(_)), "{err:?}");

        let spec_files = recorded_spec_files(&record);
        assert_eq!(spec_files.len(), 1);
        assert!(
            !spec_files[0].exists(),
            "{} was not removed",
            spec_files[0]
        );
    }

    #[test]
    fn fork_per_suite_listing_failure_is_fatal() {
        let module = Module::new([test_case_class("a.PassingTest", true)]);
        let mut config = module.config();
        config.fork_per_suite = true;
        config.test_type = Some("testng".to_owned());

        let err = module.launcher(config).launch().unwrap_err();
        assert!(matches!(err, LaunchError::Creator(_)), "{err:?}");
    }
}
