// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ClassRegistry, TestClass};
use crate::{errors::ClassLoadError, helpers::class_path_for_name};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Loads classes from a classpath of directories.
///
/// Loading is parent-first: a class visible to the parent loader is always loaded from there. A
/// class is visible to a loader if its marker file exists in one of the loader's classpath
/// directories and it is registered in the class registry.
#[derive(Clone, Debug)]
pub struct ClassLoader {
    registry: Arc<ClassRegistry>,
    parent: Option<Arc<ClassLoader>>,
    classpath: Vec<Utf8PathBuf>,
    default_assertion_status: bool,
}

impl ClassLoader {
    /// Creates a root loader over the system classpath.
    pub fn root(
        registry: Arc<ClassRegistry>,
        system_classpath: impl IntoIterator<Item = impl Into<Utf8PathBuf>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            parent: None,
            classpath: system_classpath.into_iter().map(Into::into).collect(),
            default_assertion_status: false,
        })
    }

    /// Creates a loader over `classpath` that delegates to `parent` first.
    pub fn new(
        parent: Arc<ClassLoader>,
        classpath: impl IntoIterator<Item = impl Into<Utf8PathBuf>>,
    ) -> Self {
        Self {
            registry: parent.registry.clone(),
            default_assertion_status: parent.default_assertion_status,
            parent: Some(parent),
            classpath: classpath.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets whether assertions are enabled for tests loaded by this loader.
    pub fn set_default_assertion_status(&mut self, enabled: bool) -> &mut Self {
        self.default_assertion_status = enabled;
        self
    }

    /// Returns whether assertions are enabled for tests loaded by this loader.
    pub fn default_assertion_status(&self) -> bool {
        self.default_assertion_status
    }

    /// Returns this loader's own classpath.
    pub fn classpath(&self) -> &[Utf8PathBuf] {
        &self.classpath
    }

    /// Returns the full classpath searched by this loader, ancestors first.
    pub fn search_path(&self) -> Vec<Utf8PathBuf> {
        let mut path = self
            .parent
            .as_ref()
            .map(|p| p.search_path())
            .unwrap_or_default();
        path.extend(self.classpath.iter().cloned());
        path
    }

    /// Loads the class named `name`.
    pub fn load_class(&self, name: &str) -> Result<Arc<TestClass>, ClassLoadError> {
        match self.find_class(name) {
            Some((class, location)) => {
                debug!("loaded class {name} from {location}");
                Ok(class)
            }
            None => Err(ClassLoadError::NotFound {
                name: name.to_owned(),
                searched: self.search_path(),
            }),
        }
    }

    fn find_class(&self, name: &str) -> Option<(Arc<TestClass>, &Utf8Path)> {
        if let Some(found) = self.parent.as_ref().and_then(|p| p.find_class(name)) {
            return Some(found);
        }

        let marker = class_path_for_name(name);
        let location = self
            .classpath
            .iter()
            .find(|dir| dir.join(&marker).is_file())?;
        let class = self.registry.get(name)?;
        Some((class.clone(), location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::TestClass;

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            [
                TestClass::builder("sys.S").build(),
                TestClass::builder("app.A").build(),
                TestClass::builder("app.Unlisted").build(),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn parent_first() {
        let registry = registry();
        let sys = camino_tempfile::tempdir().unwrap();
        let app = camino_tempfile::tempdir().unwrap();
        registry
            .write_manifest_for(sys.path(), |c| c.name() == "sys.S")
            .unwrap();
        registry
            .write_manifest_for(app.path(), |c| c.name() != "app.Unlisted")
            .unwrap();

        let root = ClassLoader::root(registry.clone(), [sys.path()]);
        let mut loader = ClassLoader::new(root.clone(), [app.path()]);
        loader.set_default_assertion_status(true);

        assert_eq!(loader.load_class("app.A").unwrap().name(), "app.A");
        assert_eq!(loader.load_class("sys.S").unwrap().name(), "sys.S");
        assert!(loader.default_assertion_status());
        assert!(!root.default_assertion_status());

        // The root loader cannot see the child's classpath.
        assert!(root.load_class("app.A").is_err());

        // Registered, but no marker on the classpath.
        let ClassLoadError::NotFound { name, searched } =
            loader.load_class("app.Unlisted").unwrap_err()
        else {
            panic!("expected NotFound");
        };
        assert_eq!(name, "app.Unlisted");
        assert_eq!(
            searched,
            vec![sys.path().to_path_buf(), app.path().to_path_buf()]
        );
    }

    #[test]
    fn marker_without_registration() {
        let dir = camino_tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::write(dir.path().join("x/Ghost.class"), "").unwrap();

        let root = ClassLoader::root(registry(), [dir.path()]);
        assert!(matches!(
            root.load_class("x.Ghost"),
            Err(ClassLoadError::NotFound { .. })
        ));
    }
}
