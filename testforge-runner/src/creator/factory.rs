// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    CreatorParams, TestSetCreator, annotated::AnnotatedCreator, convention::ConventionCreator,
};
use crate::errors::CreatorError;
use std::{collections::BTreeMap, fmt, sync::Arc};
use testforge_metadata::{ArgType, Invocation, InvocationArg};
use tracing::debug;

/// Constructs a creator registered by name.
pub type NamedConstructor = Arc<dyn Fn(&CreatorParams) -> Box<dyn TestSetCreator> + Send + Sync>;

/// Constructs a creator registered as an invocation target. The arguments are guaranteed to match
/// the target's declared signature.
pub type TargetConstructor = Arc<dyn Fn(&[InvocationArg]) -> Box<dyn TestSetCreator> + Send + Sync>;

/// The signature of the built-in creators when used as invocation targets: requested groups, then
/// the single test to run (empty for none).
pub static BUILTIN_SIGNATURE: &[ArgType] = &[ArgType::StrList, ArgType::Str];

/// The name resolved when no test type is given.
pub const DEFAULT_TEST_TYPE: &str = ConventionCreator::NAME;

#[derive(Clone)]
struct Target {
    signature: Vec<ArgType>,
    construct: TargetConstructor,
}

/// A table of test set creators, keyed by name and by invocation target.
#[derive(Clone, Default)]
pub struct TestSetCreatorFactory {
    named: BTreeMap<String, NamedConstructor>,
    targets: BTreeMap<String, Target>,
}

impl TestSetCreatorFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with the built-in `junit` and `junit4` creators registered, both by name
    /// and as invocation targets.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register_builtin(ConventionCreator::NAME, |params| {
            Box::new(ConventionCreator::new(params))
        });
        factory.register_builtin(AnnotatedCreator::NAME, |params| {
            Box::new(AnnotatedCreator::new(params))
        });
        factory
    }

    fn register_builtin(
        &mut self,
        name: &str,
        construct: fn(CreatorParams) -> Box<dyn TestSetCreator>,
    ) {
        self.register_named(name, move |params| construct(params.clone()));
        self.register_target(name, BUILTIN_SIGNATURE, move |args| {
            construct(params_from_args(args))
        });
    }

    /// Registers a creator by name, replacing any previous registration.
    pub fn register_named(
        &mut self,
        name: impl Into<String>,
        construct: impl Fn(&CreatorParams) -> Box<dyn TestSetCreator> + Send + Sync + 'static,
    ) -> &mut Self {
        self.named.insert(name.into(), Arc::new(construct));
        self
    }

    /// Registers a creator as an invocation target with the given argument signature, replacing
    /// any previous registration.
    pub fn register_target(
        &mut self,
        target: impl Into<String>,
        signature: &[ArgType],
        construct: impl Fn(&[InvocationArg]) -> Box<dyn TestSetCreator> + Send + Sync + 'static,
    ) -> &mut Self {
        self.targets.insert(
            target.into(),
            Target {
                signature: signature.to_vec(),
                construct: Arc::new(construct),
            },
        );
        self
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.named.keys().map(String::as_str)
    }

    /// Creates the creator registered under `name`.
    pub fn create(
        &self,
        name: &str,
        params: &CreatorParams,
    ) -> Result<Box<dyn TestSetCreator>, CreatorError> {
        let construct = self
            .named
            .get(name)
            .ok_or_else(|| CreatorError::UnknownName {
                name: name.to_owned(),
                known: self.named.keys().cloned().collect(),
            })?;
        debug!("resolved test type `{name}`");
        Ok(construct(params))
    }

    /// Instantiates the creator described by `invocation`.
    ///
    /// The invocation's argument types must match the target's declared signature exactly.
    pub fn instantiate(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn TestSetCreator>, CreatorError> {
        let target = self
            .targets
            .get(&invocation.target)
            .ok_or_else(|| CreatorError::UnknownTarget {
                target: invocation.target.clone(),
            })?;
        let actual = invocation.signature();
        if actual != target.signature {
            return Err(CreatorError::SignatureMismatch {
                target: invocation.target.clone(),
                expected: target.signature.clone(),
                actual,
            });
        }
        debug!("instantiated test set creator {invocation}");
        Ok((target.construct)(&invocation.args))
    }

    /// Resolves a creator: an explicit invocation wins, then `test_type`, then
    /// [`DEFAULT_TEST_TYPE`].
    pub fn resolve(
        &self,
        invocation: Option<&Invocation>,
        test_type: Option<&str>,
        params: &CreatorParams,
    ) -> Result<Box<dyn TestSetCreator>, CreatorError> {
        match invocation {
            Some(invocation) => self.instantiate(invocation),
            None => self.create(test_type.unwrap_or(DEFAULT_TEST_TYPE), params),
        }
    }
}

impl fmt::Debug for TestSetCreatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSetCreatorFactory")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn params_from_args(args: &[InvocationArg]) -> CreatorParams {
    let mut params = CreatorParams::default();
    if let [InvocationArg::StrList(groups), InvocationArg::Str(single_test)] = args {
        params.groups = groups.clone();
        if !single_test.is_empty() {
            params.single_test = Some(single_test.clone());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classes::{OBJECT_CLASS, TestClass},
        creator::TestSet,
    };

    #[derive(Debug)]
    struct Declining;

    impl TestSetCreator for Declining {
        fn name(&self) -> &str {
            "declining"
        }

        fn test_class(&self) -> &str {
            "Object"
        }

        fn create_test_set(&self, _class: &Arc<TestClass>) -> Option<Box<dyn TestSet>> {
            None
        }
    }

    #[test]
    fn builtins_by_name() {
        let factory = TestSetCreatorFactory::with_builtins();
        assert_eq!(factory.names().collect::<Vec<_>>(), ["junit", "junit4"]);

        let creator = factory
            .create("junit", &CreatorParams::default())
            .unwrap();
        assert_eq!(creator.name(), "junit");
        assert_eq!(creator.test_class(), OBJECT_CLASS);

        let err = factory
            .create("testng", &CreatorParams::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown test type `testng` (known types: junit, junit4)"
        );
    }

    #[test]
    fn builtins_by_invocation() {
        let factory = TestSetCreatorFactory::with_builtins();
        let params = CreatorParams {
            groups: vec!["fast".to_owned()],
            single_test: Some("testOne".to_owned()),
        };
        let invocation = params.to_invocation("junit4");
        assert_eq!(params_from_args(&invocation.args), params);

        let creator = factory.instantiate(&invocation).unwrap();
        assert_eq!(creator.name(), "junit4");

        let no_single = CreatorParams::default().to_invocation("junit");
        assert_eq!(params_from_args(&no_single.args), CreatorParams::default());
    }

    #[test]
    fn signature_mismatch() {
        let factory = TestSetCreatorFactory::with_builtins();
        let invocation = Invocation::new("junit").with_arg(true);
        let err = factory.instantiate(&invocation).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot instantiate test set creator `junit` with (bool): expected (string list, string)"
        );

        let err = factory
            .instantiate(&Invocation::new("com.example.Missing"))
            .unwrap_err();
        assert!(matches!(err, CreatorError::UnknownTarget { .. }), "{err:?}");
    }

    #[test]
    fn plugin_registration() {
        let mut factory = TestSetCreatorFactory::with_builtins();
        factory
            .register_named("declining", |_| Box::new(Declining))
            .register_target("com.example.Declining", &[ArgType::Int], |args| {
                assert_eq!(args, [InvocationArg::Int(7)]);
                Box::new(Declining)
            });

        let creator = factory
            .resolve(None, Some("declining"), &CreatorParams::default())
            .unwrap();
        assert_eq!(creator.name(), "declining");

        let invocation = Invocation::new("com.example.Declining").with_arg(7_i64);
        let creator = factory
            .resolve(Some(&invocation), Some("junit"), &CreatorParams::default())
            .unwrap();
        assert_eq!(creator.name(), "declining", "invocation wins over test type");

        let creator = factory
            .resolve(None, None, &CreatorParams::default())
            .unwrap();
        assert_eq!(creator.name(), DEFAULT_TEST_TYPE);
    }
}
