// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test classes and class loading.
//!
//! Test classes are registered at compile time in a [`ClassRegistry`] that is linked into a
//! harness binary. A registry can write out a *class manifest*: one `.class` marker file per
//! class, laid out by package. A [`ClassLoader`] resolves a class name by looking for its marker
//! file on its classpath and then fetching the registered class.

mod loader;
mod registry;

pub use loader::*;
pub use registry::*;

use crate::{
    context::TestContext,
    creator::convention::Suite,
    errors::{HookKind, TestFailure},
};
use debug_ignore::DebugIgnore;
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

/// The root type every class is assignable to.
pub const OBJECT_CLASS: &str = "Object";

/// The sentinel group that matches every requested group.
pub const ALL_GROUPS: &str = "ALL";

/// A test body or hook.
pub type TestFn = Arc<dyn Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync>;

/// Builds a suite out of a class.
pub type SuiteFactoryFn = Arc<dyn Fn(&Arc<TestClass>) -> Suite + Send + Sync>;

/// Group metadata attached to a suite factory or a test method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupMarker {
    skip: bool,
    groups: Vec<String>,
}

impl GroupMarker {
    /// A marker that never runs.
    pub fn skip() -> Self {
        Self {
            skip: true,
            groups: Vec::new(),
        }
    }

    /// A marker that runs when any of `groups` is requested, or when [`ALL_GROUPS`] is among
    /// them.
    pub fn groups(groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            skip: false,
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if this marker says "skip always".
    pub fn is_skip(&self) -> bool {
        self.skip
    }

    /// Returns the named groups.
    pub fn group_names(&self) -> &[String] {
        &self.groups
    }

    /// Returns true if this marker selects a run requesting `requested` groups.
    ///
    /// Skip markers never match. An empty request matches every non-skip marker.
    pub fn admits(&self, requested: &[String]) -> bool {
        if self.skip {
            return false;
        }
        if requested.is_empty() {
            return true;
        }
        self.groups.iter().any(|g| g == ALL_GROUPS)
            || requested
                .iter()
                .any(|r| r == ALL_GROUPS || self.groups.contains(r))
    }
}

/// A static suite factory declared by a class.
#[derive(Clone)]
pub struct SuiteFactory {
    groups: Option<GroupMarker>,
    build: SuiteFactoryFn,
}

impl SuiteFactory {
    /// Returns the group marker on the factory, if any.
    pub fn groups(&self) -> Option<&GroupMarker> {
        self.groups.as_ref()
    }

    /// Builds the suite.
    pub fn build(&self, class: &Arc<TestClass>) -> Suite {
        (self.build)(class)
    }
}

impl fmt::Debug for SuiteFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteFactory")
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

/// A test method on a class.
#[derive(Clone, Debug)]
pub struct TestMethod {
    name: String,
    annotated: bool,
    ignored: bool,
    groups: Option<GroupMarker>,
    body: DebugIgnore<TestFn>,
}

impl TestMethod {
    /// Creates a new, unannotated method.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            annotated: false,
            ignored: false,
            groups: None,
            body: DebugIgnore(Arc::new(body)),
        }
    }

    /// Marks this method with a test annotation.
    pub fn annotated(mut self) -> Self {
        self.annotated = true;
        self
    }

    /// Marks this method as ignored.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Attaches a group marker to this method.
    pub fn with_groups(mut self, groups: GroupMarker) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Returns the method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the method carries a test annotation.
    pub fn is_annotated(&self) -> bool {
        self.annotated
    }

    /// Returns true if the method is ignored.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Returns the method's group marker, if any.
    pub fn groups(&self) -> Option<&GroupMarker> {
        self.groups.as_ref()
    }

    /// Returns the method body.
    pub fn body(&self) -> &TestFn {
        &self.body
    }
}

#[derive(Clone, Debug, Default)]
struct Hooks {
    before_all: Option<DebugIgnore<TestFn>>,
    after_all: Option<DebugIgnore<TestFn>>,
    before_each: Option<DebugIgnore<TestFn>>,
    after_each: Option<DebugIgnore<TestFn>>,
}

/// A compiled test class.
#[derive(Debug)]
pub struct TestClass {
    name: String,
    is_abstract: bool,
    supertypes: Vec<String>,
    suite_factory: Option<SuiteFactory>,
    methods: Vec<TestMethod>,
    hooks: Hooks,
}

impl TestClass {
    /// Starts building a class with the given fully-qualified name.
    pub fn builder(name: impl Into<String>) -> TestClassBuilder {
        TestClassBuilder {
            class: TestClass {
                name: name.into(),
                is_abstract: false,
                supertypes: Vec::new(),
                suite_factory: None,
                methods: Vec::new(),
                hooks: Hooks::default(),
            },
        }
    }

    /// Returns the fully-qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the class is abstract.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Returns the types this class is assignable to, besides itself and [`OBJECT_CLASS`].
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Returns true if this class is assignable to `base`.
    pub fn is_assignable_to(&self, base: &str) -> bool {
        base == OBJECT_CLASS || base == self.name || self.supertypes.iter().any(|s| s == base)
    }

    /// Returns the class's static suite factory, if any.
    pub fn suite_factory(&self) -> Option<&SuiteFactory> {
        self.suite_factory.as_ref()
    }

    /// Returns the class's test methods, in declaration order.
    pub fn methods(&self) -> &[TestMethod] {
        &self.methods
    }

    /// Returns the method with the given name.
    pub fn method(&self, name: &str) -> Option<&TestMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Runs the per-class hook of the given kind, if one is declared.
    pub fn run_hook(&self, hook: HookKind, ctx: &TestContext) -> Result<(), TestFailure> {
        let f = match hook {
            HookKind::BeforeAll => &self.hooks.before_all,
            HookKind::AfterAll => &self.hooks.after_all,
            HookKind::BeforeEach => &self.hooks.before_each,
            HookKind::AfterEach => &self.hooks.after_each,
        };
        match f {
            Some(f) => call_catching_panics(f, ctx),
            None => Ok(()),
        }
    }

    /// Invokes a test body wrapped in this class's per-test hooks.
    ///
    /// The after-each hook runs even if the body fails. The first failure is returned.
    pub fn invoke(&self, body: &TestFn, ctx: &TestContext) -> Result<(), TestFailure> {
        self.run_hook(HookKind::BeforeEach, ctx)?;
        let result = call_catching_panics(body, ctx);
        let after = self.run_hook(HookKind::AfterEach, ctx);
        result.and(after)
    }
}

/// Calls a test function, turning panics into failures.
pub fn call_catching_panics(f: &TestFn, ctx: &TestContext) -> Result<(), TestFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(TestFailure::from_panic(&*payload)),
    }
}

/// Builder for [`TestClass`].
#[derive(Debug)]
#[must_use]
pub struct TestClassBuilder {
    class: TestClass,
}

impl TestClassBuilder {
    /// Marks the class as abstract.
    pub fn abstract_class(mut self) -> Self {
        self.class.is_abstract = true;
        self
    }

    /// Declares that the class is assignable to `supertype`.
    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.class.supertypes.push(supertype.into());
        self
    }

    /// Adds a method.
    pub fn method(mut self, method: TestMethod) -> Self {
        self.class.methods.push(method);
        self
    }

    /// Adds an unannotated method.
    pub fn test(
        self,
        name: impl Into<String>,
        body: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.method(TestMethod::new(name, body))
    }

    /// Adds an annotated test method.
    pub fn annotated_test(
        self,
        name: impl Into<String>,
        body: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.method(TestMethod::new(name, body).annotated())
    }

    /// Declares a static suite factory, optionally with a group marker.
    pub fn suite_factory(
        mut self,
        groups: Option<GroupMarker>,
        build: impl Fn(&Arc<TestClass>) -> Suite + Send + Sync + 'static,
    ) -> Self {
        self.class.suite_factory = Some(SuiteFactory {
            groups,
            build: Arc::new(build),
        });
        self
    }

    /// Sets the hook that runs once before all tests.
    pub fn before_all(
        mut self,
        f: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.class.hooks.before_all = Some(DebugIgnore(Arc::new(f)));
        self
    }

    /// Sets the hook that runs once after all tests.
    pub fn after_all(
        mut self,
        f: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.class.hooks.after_all = Some(DebugIgnore(Arc::new(f)));
        self
    }

    /// Sets the hook that runs before each test.
    pub fn before_each(
        mut self,
        f: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.class.hooks.before_each = Some(DebugIgnore(Arc::new(f)));
        self
    }

    /// Sets the hook that runs after each test.
    pub fn after_each(
        mut self,
        f: impl Fn(&TestContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    ) -> Self {
        self.class.hooks.after_each = Some(DebugIgnore(Arc::new(f)));
        self
    }

    /// Builds the class.
    pub fn build(self) -> Arc<TestClass> {
        Arc::new(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_case::test_case;

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test_case(GroupMarker::skip(), &[], false; "skip with no request")]
    #[test_case(GroupMarker::skip(), &["ALL"], false; "skip with ALL")]
    #[test_case(GroupMarker::groups(["fast"]), &[], true; "groups with no request")]
    #[test_case(GroupMarker::groups(["fast"]), &["fast"], true; "matching group")]
    #[test_case(GroupMarker::groups(["fast"]), &["db"], false; "other group")]
    #[test_case(GroupMarker::groups(["ALL"]), &["db"], true; "marker with ALL")]
    #[test_case(GroupMarker::groups(["fast"]), &["ALL"], true; "request for ALL")]
    fn admits(marker: GroupMarker, requested: &[&str], expected: bool) {
        assert_eq!(marker.admits(&strings(requested)), expected);
    }

    #[test]
    fn assignability() {
        let class = TestClass::builder("a.B").extends("TestCase").build();
        assert!(class.is_assignable_to("a.B"));
        assert!(class.is_assignable_to("TestCase"));
        assert!(class.is_assignable_to(OBJECT_CLASS));
        assert!(!class.is_assignable_to("Other"));
    }

    #[test]
    fn invoke_runs_hooks_around_body() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let (b, a) = (before.clone(), after.clone());
        let class = TestClass::builder("a.B")
            .before_each(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .after_each(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .test("testPanics", |_| panic!("kaboom"))
            .build();

        let ctx = TestContext::default();
        let failure = class.invoke(class.methods()[0].body(), &ctx).unwrap_err();
        assert_eq!(failure.message(), "kaboom");
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1, "after-each runs despite the panic");
    }

    #[test]
    fn failing_before_each_skips_body() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let class = TestClass::builder("a.B")
            .before_each(|_| Err(TestFailure::error("setup failed")))
            .test("testX", move |_| {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let err = class
            .invoke(class.methods()[0].body(), &TestContext::default())
            .unwrap_err();
        assert_eq!(err.message(), "setup failed");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
