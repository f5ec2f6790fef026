// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testforge.

use crate::runner::ExitClass;
use camino::{FromPathBufError, Utf8PathBuf};
use config::ConfigError;
use itertools::Itertools;
use std::{error, fmt};
use testforge_metadata::{ArgType, InvocationParseError};
use thiserror::Error;

/// An error that occurred while parsing a test module config.
#[derive(Debug, Error)]
#[error("failed to parse test module config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file the error occurred in.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a test module config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while reading or merging config sources.
    #[error(transparent)]
    Build(ConfigError),

    /// An error occurred while deserializing the merged config.
    #[error("error at `{}`", .0.path())]
    Deserialize(#[source] serde_path_to_error::Error<ConfigError>),
}

/// An error that occurred while constructing or running a [`DirectoryScanner`].
///
/// [`DirectoryScanner`]: crate::scanner::DirectoryScanner
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScanError {
    /// The base directory does not exist.
    #[error("scan base directory `{base}` does not exist")]
    BaseNotFound {
        /// The base directory.
        base: Utf8PathBuf,
    },

    /// The base directory is not a directory.
    #[error("scan base `{base}` is not a directory")]
    BaseNotDirectory {
        /// The base directory.
        base: Utf8PathBuf,
    },

    /// An error occurred while walking the directory tree.
    #[error("error walking directory tree under `{base}`")]
    Walk {
        /// The base directory.
        base: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A non-UTF-8 path was encountered.
    #[error("non-UTF-8 path encountered while scanning")]
    NonUtf8Path(#[source] FromPathBufError),
}

/// An error that occurred while loading a class through a [`ClassLoader`].
///
/// [`ClassLoader`]: crate::classes::ClassLoader
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ClassLoadError {
    /// The class is not registered in the class registry, or its class file was not found on the
    /// classpath.
    #[error(
        "class `{name}` not found (searched classpath: {})",
        .searched.iter().join(", ")
    )]
    NotFound {
        /// The name of the class.
        name: String,

        /// The classpath that was searched, ancestors first.
        searched: Vec<Utf8PathBuf>,
    },

    /// A scanned path could not be converted into a class name.
    #[error("`{path}` is not a class file")]
    NotAClassFile {
        /// The path that was scanned.
        path: Utf8PathBuf,
    },
}

/// An error that occurred while resolving or instantiating a
/// [`TestSetCreator`](crate::creator::TestSetCreator).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreatorError {
    /// No creator was registered under the given name.
    #[error(
        "unknown test type `{name}` (known types: {})",
        .known.join(", ")
    )]
    UnknownName {
        /// The name that was requested.
        name: String,

        /// All known names, sorted.
        known: Vec<String>,
    },

    /// No creator was registered for the given invocation target.
    #[error("unknown test set creator `{target}`")]
    UnknownTarget {
        /// The invocation target.
        target: String,
    },

    /// The invocation arguments did not match the target's signature.
    #[error(
        "cannot instantiate test set creator `{target}` with ({}): expected ({})",
        .actual.iter().join(", "),
        .expected.iter().join(", ")
    )]
    SignatureMismatch {
        /// The invocation target.
        target: String,

        /// The declared signature of the target.
        expected: Vec<ArgType>,

        /// The types of the arguments that were passed in.
        actual: Vec<ArgType>,
    },

    /// The invocation could not be parsed.
    #[error(transparent)]
    InvalidInvocation(#[from] InvocationParseError),
}

/// A fatal error that occurred during a [`TestRunner`](crate::runner::TestRunner) run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// Scanning the test classes directory failed.
    #[error("error scanning for test classes")]
    Scan(#[from] ScanError),

    /// A scanned class could not be loaded.
    #[error("error loading test class")]
    ClassLoad(#[from] ClassLoadError),

    /// A loaded class is not assignable to the base type the creator expects.
    #[error("class `{class_name}` is not assignable to `{expected}`")]
    NotAssignable {
        /// The name of the loaded class.
        class_name: String,

        /// The base type the creator expects.
        expected: String,
    },

    /// Two test sets resolved to the same name.
    #[error("duplicate test `{name}` (found in `{first}` and `{second}`)")]
    DuplicateTestSet {
        /// The duplicated test set name.
        name: String,

        /// The class that produced the first test set.
        first: String,

        /// The class that produced the second test set.
        second: String,
    },

    /// The report failed.
    #[error("error writing test report")]
    Report(#[from] ReportError),
}

/// An error that occurred while writing a report to its output directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path `{file}`")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to `{file}`")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },

    /// The report was used before [`TestReport::init`](crate::report::TestReport::init) was
    /// called.
    #[error("report was not initialized with an output directory")]
    NotInitialized,
}

/// An error that occurred while reading or writing a report spec file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportSpecError {
    /// An error occurred while reading the spec file.
    #[error("error reading report spec file `{path}`")]
    Read {
        /// The spec file.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while deserializing the spec file.
    #[error("error deserializing report spec file `{path}`")]
    Deserialize {
        /// The spec file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
    },

    /// The spec file was written by an incompatible version.
    #[error(
        "report spec file `{path}` has format version {found}, but only version {supported} \
         is supported"
    )]
    UnsupportedFormatVersion {
        /// The spec file.
        path: Utf8PathBuf,

        /// The version found in the file.
        found: u32,

        /// The supported version.
        supported: u32,
    },

    /// An error occurred while serializing the report.
    #[error("error serializing report")]
    Serialize(#[source] serde_json::Error),

    /// An error occurred while writing the spec file.
    #[error("error writing report spec file `{path}`")]
    Write {
        /// The spec file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that occurred while managing a coverage session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoverageError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path `{file}`")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while collecting profile files.
    #[error("error collecting coverage profiles under `{dir}`")]
    Collect {
        /// The profile directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// An error occurred while writing the coverage index.
    #[error("error writing coverage index `{path}`")]
    WriteIndex {
        /// The index file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error returned by a [`TestLauncher`](crate::launcher::TestLauncher).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// No tests were found, and the module is configured to fail in that case.
    #[error("no tests found in `{test_classes_dir}`")]
    NoTests {
        /// The test classes directory.
        test_classes_dir: Utf8PathBuf,
    },

    /// Tests failed, and the module is configured to fail in that case.
    #[error("tests {} (reports in `{report_dir}`)", exit_class.describe())]
    TestsFailed {
        /// The overall exit classification.
        exit_class: ExitClass,

        /// The report output directory.
        report_dir: Utf8PathBuf,
    },

    /// A fatal error occurred during an in-process run or listing pass.
    #[error("error running tests")]
    Runner(#[from] RunnerError),

    /// The creator could not be resolved.
    #[error("error resolving test set creator")]
    Creator(#[from] CreatorError),

    /// The report could not be written.
    #[error("error writing test report")]
    Report(#[from] ReportError),

    /// The report spec file could not be read or written.
    #[error("error exchanging report with child process")]
    ReportSpec(#[from] ReportSpecError),

    /// The coverage session failed.
    #[error("error managing coverage session")]
    Coverage(#[from] CoverageError),

    /// A temporary file could not be created.
    #[error("error creating temporary report spec file")]
    TempFile(#[source] std::io::Error),

    /// The current executable could not be determined.
    #[error("error determining current executable")]
    CurrentExe(#[source] std::io::Error),

    /// A path was not valid UTF-8.
    #[error("non-UTF-8 path encountered")]
    NonUtf8Path(#[source] FromPathBufError),

    /// The classpath could not be joined into a single value.
    #[error("error joining classpath")]
    JoinClasspath(#[source] std::env::JoinPathsError),

    /// The debugger command could not be parsed.
    #[error("error parsing debugger command `{command}`")]
    DebuggerParse {
        /// The debugger command.
        command: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },
}

/// An error that occurred in a child process entry point before or while running tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EntryError {
    /// A `-D` argument was not of the form `key=value`.
    #[error("invalid property definition `{input}` (expected key=value)")]
    InvalidProperty {
        /// The argument.
        input: String,
    },

    /// The creator could not be resolved.
    #[error("error resolving test set creator")]
    Creator(#[from] CreatorError),

    /// The report spec file could not be read or written.
    #[error("error exchanging report with parent process")]
    ReportSpec(#[from] ReportSpecError),

    /// A fatal error occurred while running tests.
    #[error("error running tests")]
    Runner(#[from] RunnerError),
}

/// A failure within a single test.
///
/// Test failures are recorded in the report and never abort the run.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TestFailure {
    kind: TestFailureKind,
    message: String,
}

impl TestFailure {
    /// Creates a new assertion failure.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: TestFailureKind::Assertion,
            message: message.into(),
        }
    }

    /// Creates a new failure for an error returned by a test.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: TestFailureKind::Error,
            message: message.into(),
        }
    }

    /// Creates a new failure from a panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "(non-string panic payload)".to_owned()
        };
        Self {
            kind: TestFailureKind::Panic,
            message,
        }
    }

    /// Returns the kind of failure.
    pub fn kind(&self) -> TestFailureKind {
        self.kind
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The kind of a [`TestFailure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestFailureKind {
    /// An assertion did not hold.
    Assertion,

    /// The test returned an error.
    Error,

    /// The test panicked.
    Panic,
}

impl TestFailureKind {
    /// Returns a short name for this kind, used as the JUnit failure type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assertion => "assertion failed",
            Self::Error => "error",
            Self::Panic => "panicked",
        }
    }
}

impl fmt::Display for TestFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure of a whole suite, outside the per-test harness.
///
/// The runner logs these and moves on to the next suite.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum SuiteError {
    /// A per-class hook failed.
    #[error("{hook} hook for `{class_name}` failed")]
    Hook {
        /// The hook that failed.
        hook: HookKind,

        /// The class the hook belongs to.
        class_name: String,

        /// The failure.
        #[source]
        failure: TestFailure,
    },

    /// The suite body panicked.
    #[error("suite `{name}` panicked")]
    Panicked {
        /// The suite name.
        name: String,

        /// The panic, as a failure.
        #[source]
        failure: TestFailure,
    },
}

/// A per-test or per-class hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    /// Runs once before all tests in a class.
    BeforeAll,

    /// Runs once after all tests in a class.
    AfterAll,

    /// Runs before each test.
    BeforeEach,

    /// Runs after each test.
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeAll => "before-all",
            Self::AfterAll => "after-all",
            Self::BeforeEach => "before-each",
            Self::AfterEach => "after-each",
        })
    }
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E> fmt::Display for DisplayErrorChain<E>
where
    E: error::Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut next = self.error.source();
        if next.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(cause) = next {
            write!(f, "\n  - {cause}")?;
            next = cause.source();
        }

        Ok(())
    }
}
