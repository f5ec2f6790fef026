// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test module configuration.
//!
//! A [`TestModuleConfig`] describes how one module's tests are discovered and where they run. It
//! is usually read from a TOML file:
//!
//! ```toml
//! test-type = "junit"
//! includes = ["**/*Test.class"]
//! groups = ["fast"]
//! fork-per-suite = true
//! max-memory = "512 MiB"
//! timeout = "5m"
//! reports = ["simple", "junit"]
//!
//! [properties]
//! "db.url" = "jdbc:h2:mem:test"
//!
//! [paths]
//! test-classes-dir = "target/test-classes"
//! output-dir = "target/test-reports"
//! ```

use crate::{
    creator::CreatorParams,
    errors::{ConfigParseError, ConfigParseErrorKind},
    report::ReportKind,
};
use bytesize::ByteSize;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, File, FileFormat, Source};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use testforge_metadata::Invocation;

/// The include pattern used when none is configured.
pub const DEFAULT_INCLUDE: &str = "**/*.class";

/// How tests are executed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LaunchMode {
    /// Tests run in the current process.
    InProcess,

    /// Tests run in a single child process.
    Forked,

    /// Each test set runs in its own child process.
    ForkPerSuite,
}

impl LaunchMode {
    /// Returns true if tests run in a child process.
    pub fn is_forked(self) -> bool {
        !matches!(self, Self::InProcess)
    }
}

/// Configuration for running the tests of one module.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct TestModuleConfig {
    /// The name of the test set creator to use. Defaults to `junit`.
    pub test_type: Option<String>,

    /// An explicit creator invocation. Takes precedence over `test-type`.
    pub creator: Option<Invocation>,

    /// Patterns selecting class files under the test classes directory.
    pub includes: Vec<String>,

    /// Patterns excluding class files under the test classes directory.
    pub excludes: Vec<String>,

    /// Groups to run. Empty means no group filtering.
    pub groups: Vec<String>,

    /// If set, only this test method runs.
    pub single_test: Option<String>,

    /// Whether to run tests in a child process.
    pub fork: bool,

    /// Whether to run each test set in its own child process. Implies `fork`.
    pub fork_per_suite: bool,

    /// The address space limit for child processes.
    pub max_memory: Option<ByteSize>,

    /// Environment variables set for child processes.
    pub env: BTreeMap<String, String>,

    /// Properties visible to tests.
    pub properties: BTreeMap<String, String>,

    /// The working directory of child processes.
    pub working_dir: Option<Utf8PathBuf>,

    /// Whether test assertions are enabled.
    pub enable_assertions: bool,

    /// Whether to collect coverage profiles. Implies `fork`.
    pub coverage: bool,

    /// A command that child processes are run under, for example `gdb --args`. Implies `fork`.
    pub debugger: Option<String>,

    /// Whether a run in which no tests ran is an error.
    pub fail_if_empty: bool,

    /// Whether failing tests are an error, rather than a warning.
    pub fail_on_error: bool,

    /// Whether to log verbosely, including in child processes.
    pub verbose: bool,

    /// How long a child process may run before it is killed.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// The reports to produce. Defaults to a console report.
    pub reports: Vec<ReportKind>,

    /// Directories and classpaths.
    pub paths: TestPaths,
}

impl Default for TestModuleConfig {
    fn default() -> Self {
        Self {
            test_type: None,
            creator: None,
            includes: vec![DEFAULT_INCLUDE.to_owned()],
            excludes: Vec::new(),
            groups: Vec::new(),
            single_test: None,
            fork: false,
            fork_per_suite: false,
            max_memory: None,
            env: BTreeMap::new(),
            properties: BTreeMap::new(),
            working_dir: None,
            enable_assertions: true,
            coverage: false,
            debugger: None,
            fail_if_empty: false,
            fail_on_error: false,
            verbose: false,
            timeout: None,
            reports: Vec::new(),
            paths: TestPaths::default(),
        }
    }
}

/// Directories and classpaths for a test module.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct TestPaths {
    /// The compiled classes under test.
    pub classes_dir: Option<Utf8PathBuf>,

    /// The compiled test classes. This is the directory that is scanned for tests.
    pub test_classes_dir: Utf8PathBuf,

    /// Library classpath entries.
    pub classpath: Vec<Utf8PathBuf>,

    /// Entries that stay on the process-level classpath of child processes.
    pub system_classpath: Vec<Utf8PathBuf>,

    /// Where reports are written.
    pub output_dir: Utf8PathBuf,
}

impl Default for TestPaths {
    fn default() -> Self {
        Self {
            classes_dir: None,
            test_classes_dir: "target/test-classes".into(),
            classpath: Vec::new(),
            system_classpath: Vec::new(),
            output_dir: "target/test-reports".into(),
        }
    }
}

impl TestPaths {
    /// Returns the loader classpath: the classes under test, then the test classes, then the
    /// library classpath.
    pub fn loader_classpath(&self) -> Vec<Utf8PathBuf> {
        self.classes_dir
            .iter()
            .chain(std::iter::once(&self.test_classes_dir))
            .chain(&self.classpath)
            .cloned()
            .collect()
    }

    fn resolve(&mut self, base: &Utf8Path) {
        let resolve = |path: &mut Utf8PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.classes_dir.iter_mut().for_each(resolve);
        resolve(&mut self.test_classes_dir);
        self.classpath.iter_mut().for_each(resolve);
        self.system_classpath.iter_mut().for_each(resolve);
        resolve(&mut self.output_dir);
    }
}

impl TestModuleConfig {
    /// Reads a config from a TOML file.
    ///
    /// Relative paths in the file are resolved against the directory containing it.
    pub fn from_toml_file(config_file: &Utf8Path) -> Result<Self, ConfigParseError> {
        let source = File::new(config_file.as_str(), FileFormat::Toml);
        let mut config = Self::build_and_deserialize(source)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;

        if let Some(base) = config_file.parent() {
            config.paths.resolve(base);
            if let Some(working_dir) = &mut config.working_dir
                && working_dir.is_relative()
            {
                *working_dir = base.join(&*working_dir);
            }
        }
        Ok(config)
    }

    /// Reads a config from a TOML string. Paths are kept as written.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigParseError> {
        Self::build_and_deserialize(File::from_str(toml, FileFormat::Toml))
            .map_err(|kind| ConfigParseError::new("<string>", kind))
    }

    fn build_and_deserialize(
        source: impl Source + Send + Sync + 'static,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = Config::builder()
            .add_source(source)
            .build()
            .map_err(ConfigParseErrorKind::Build)?;

        serde_path_to_error::deserialize(config).map_err(ConfigParseErrorKind::Deserialize)
    }

    /// Returns how tests are executed.
    ///
    /// Per-suite forking, a debugger and coverage all require a child process, so each forces a
    /// forked mode even if `fork` is false.
    pub fn launch_mode(&self) -> LaunchMode {
        if self.fork_per_suite {
            LaunchMode::ForkPerSuite
        } else if self.fork || self.debugger.is_some() || self.coverage {
            LaunchMode::Forked
        } else {
            LaunchMode::InProcess
        }
    }

    /// Returns the parameters for the built-in test set creators.
    pub fn creator_params(&self) -> CreatorParams {
        CreatorParams {
            groups: self.groups.clone(),
            single_test: self.single_test.clone(),
        }
    }
}
