// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entry point of child processes spawned by a [`TestLauncher`](crate::launcher::TestLauncher).
//!
//! A harness binary links in the class registry for its test classes and calls [`main`]:
//!
//! ```no_run
//! # fn registry() -> testforge_runner::classes::ClassRegistry { Default::default() }
//! fn main() {
//!     testforge_runner::entry::main(std::sync::Arc::new(registry()));
//! }
//! ```
//!
//! The child exits with the code of its [`ExitClass`]. Every argument except `-D` property
//! definitions has `${name}` references expanded against the properties and the environment,
//! and `$$` unescaped to `$`.

use crate::{
    classes::{ClassLoader, ClassRegistry},
    config::DEFAULT_INCLUDE,
    context::{PropertyOverlay, TestContext},
    creator::{CreatorParams, TestSetCreatorFactory},
    errors::{CreatorError, DisplayErrorChain, EntryError},
    helpers::{expand_properties, expand_property_values, split_list},
    output::init_logging,
    report::{Report, ReportKind, read_report_spec, write_report_spec},
    runner::{ExitClass, TestRunnerBuilder},
};
use camino::Utf8PathBuf;
use clap::Parser;
use std::{collections::BTreeMap, sync::Arc};
use testforge_metadata::Invocation;
use tracing::{debug, error};

/// The environment variable carrying a child's system classpath, in the platform's path list
/// syntax.
pub const CLASSPATH_ENV: &str = "TESTFORGE_CLASSPATH";

/// Command-line arguments of a child process.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "testforge-child",
    about = "Runs test sets on behalf of a testforge launcher"
)]
pub struct ChildArgs {
    /// Log verbosely.
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit with NO_TESTS if no test sets ran.
    #[arg(short = 'f', long)]
    pub fail_if_empty: bool,

    /// Run only the test set created from this class, given as a class name or a class file path
    /// relative to the test classes directory.
    #[arg(short = 's', long = "suite", value_name = "SELECTOR")]
    pub suite: Option<String>,

    /// Colon-separated patterns selecting class files.
    #[arg(short = 'i', long, value_name = "PATTERNS")]
    pub includes: Option<String>,

    /// Colon-separated patterns excluding class files.
    #[arg(short = 'e', long, value_name = "PATTERNS")]
    pub excludes: Option<String>,

    /// The classpath test classes are loaded from.
    #[arg(short = 'c', long, value_name = "CLASSPATH")]
    pub classpath: Option<String>,

    /// Colon-separated groups to run.
    #[arg(short = 'g', long, value_name = "GROUPS")]
    pub groups: Option<String>,

    /// The directory reports are written to.
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<String>,

    /// The name of the test set creator.
    #[arg(short = 't', long = "test-type", value_name = "NAME", conflicts_with = "creator")]
    pub test_type: Option<String>,

    /// A JSON test set creator invocation.
    #[arg(long, value_name = "JSON")]
    pub creator: Option<String>,

    /// Colon-separated reports to produce, if no report spec file is given.
    #[arg(short = 'r', long, value_enum, value_delimiter = ':', value_name = "REPORTS")]
    pub reports: Vec<ReportKind>,

    /// A property visible to tests.
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Enable test assertions.
    #[arg(long)]
    pub enable_assertions: bool,

    /// The file the report is restored from, and saved to after a single suite runs.
    #[arg(long, value_name = "PATH")]
    pub report_specs_file: Option<String>,

    /// Only run this test method.
    #[arg(long, value_name = "NAME")]
    pub single_test: Option<String>,

    /// The directory test classes are discovered in.
    pub test_classes_dir: String,
}

/// Runs a child process with the built-in test set creators, and exits.
pub fn main(registry: Arc<ClassRegistry>) -> ! {
    main_with_factory(registry, TestSetCreatorFactory::with_builtins())
}

/// Runs a child process with the creators in `factory`, and exits.
///
/// Errors are printed and exit with the ERROR code.
pub fn main_with_factory(registry: Arc<ClassRegistry>, factory: TestSetCreatorFactory) -> ! {
    let args = match ChildArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not errors.
            let code = if err.use_stderr() {
                ExitClass::Error.code()
            } else {
                ExitClass::Ok.code()
            };
            std::process::exit(code);
        }
    };
    init_logging(args.verbose);

    let code = match run_main(args, registry, &factory) {
        Ok(exit_class) => exit_class.code(),
        Err(err) => {
            error!("{}", DisplayErrorChain::new(&err));
            ExitClass::Error.code()
        }
    };
    std::process::exit(code)
}

/// Runs the tests described by `args`.
///
/// With a suite selector, only that suite runs, and the report is saved back to the report spec
/// file afterwards. Otherwise the whole run executes and the report is not saved.
pub fn run_main(
    args: ChildArgs,
    registry: Arc<ClassRegistry>,
    factory: &TestSetCreatorFactory,
) -> Result<ExitClass, EntryError> {
    let properties = parse_properties(&args.properties)?;
    let expand = |value: &str| {
        expand_properties(value, |name| {
            properties
                .get(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
        })
        .into_owned()
    };

    let system_classpath = std::env::var(CLASSPATH_ENV)
        .map(|classpath| split_classpath(&classpath))
        .unwrap_or_default();
    let classpath = args
        .classpath
        .as_deref()
        .map(|classpath| split_classpath(&expand(classpath)))
        .unwrap_or_default();
    let root = ClassLoader::root(registry, system_classpath);
    let mut loader = ClassLoader::new(root, classpath);
    loader.set_default_assertion_status(args.enable_assertions);

    let params = CreatorParams {
        groups: args
            .groups
            .as_deref()
            .map(|groups| split_list(&expand(groups)))
            .unwrap_or_default(),
        single_test: args.single_test.as_deref().map(expand),
    };
    let invocation = args
        .creator
        .as_deref()
        .map(|creator| expand(creator).parse::<Invocation>())
        .transpose()
        .map_err(CreatorError::from)?;
    let test_type = args.test_type.as_deref().map(expand);
    let creator = factory.resolve(invocation.as_ref(), test_type.as_deref(), &params)?;
    debug!("using test set creator `{}`", creator.name());

    let report_spec_file = args
        .report_specs_file
        .as_deref()
        .map(|path| Utf8PathBuf::from(expand(path)));
    let mut report = match &report_spec_file {
        Some(path) => read_report_spec(path)?,
        None => Report::from_kinds(&args.reports),
    };

    let mut builder = TestRunnerBuilder::new(expand(&args.test_classes_dir));
    builder
        .set_includes(match args.includes.as_deref() {
            Some(includes) => split_list(&expand(includes)),
            None => vec![DEFAULT_INCLUDE.to_owned()],
        })
        .set_excludes(
            args.excludes
                .as_deref()
                .map(|excludes| split_list(&expand(excludes)))
                .unwrap_or_default(),
        )
        .set_fail_if_empty(args.fail_if_empty);
    if let Some(output_dir) = args.output_dir.as_deref() {
        builder.set_output_dir(expand(output_dir));
    }
    let runner = builder.build();
    let selector = args.suite.as_deref().map(expand);

    let _overlay = PropertyOverlay::apply(properties.clone());
    let ctx = TestContext::new(properties, args.enable_assertions);

    match selector {
        Some(selector) => {
            let exit_class =
                runner.run_one(&selector, creator.as_ref(), &mut report, &loader, &ctx)?;
            if let Some(path) = &report_spec_file {
                write_report_spec(path, &report)?;
            }
            Ok(exit_class)
        }
        None => Ok(runner.run(creator.as_ref(), &mut report, &loader, &ctx)?),
    }
}

/// Parses `key=value` definitions and expands references in their values.
fn parse_properties(definitions: &[String]) -> Result<BTreeMap<String, String>, EntryError> {
    let mut raw = BTreeMap::new();
    for definition in definitions {
        let Some((key, value)) = definition.split_once('=') else {
            return Err(EntryError::InvalidProperty {
                input: definition.clone(),
            });
        };
        if key.is_empty() {
            return Err(EntryError::InvalidProperty {
                input: definition.clone(),
            });
        }
        raw.insert(key.to_owned(), value.to_owned());
    }
    Ok(expand_property_values(&raw))
}

fn split_classpath(classpath: &str) -> Vec<Utf8PathBuf> {
    std::env::split_paths(classpath)
        .filter(|path| !path.as_os_str().is_empty())
        .filter_map(|path| Utf8PathBuf::try_from(path).ok())
        .collect()
}
