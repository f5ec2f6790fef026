// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestClass;
use crate::helpers::class_path_for_name;
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, io, sync::Arc};
use tracing::debug;

/// The table of test classes linked into the current binary.
#[derive(Clone, Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<TestClass>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, returning the class previously registered under the same name.
    pub fn register(&mut self, class: Arc<TestClass>) -> Option<Arc<TestClass>> {
        self.classes.insert(class.name().to_owned(), class)
    }

    /// Returns the class registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<TestClass>> {
        self.classes.get(name)
    }

    /// Iterates over all registered classes, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TestClass>> + '_ {
        self.classes.values()
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Writes a class manifest for all registered classes into `dir`.
    ///
    /// Each class `a.b.C` gets an (empty-bodied) marker file at `dir/a/b/C.class`. Returns the
    /// marker paths relative to `dir`.
    pub fn write_manifest(&self, dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        self.write_manifest_for(dir, |_| true)
    }

    /// Writes a class manifest for the registered classes selected by `filter`.
    ///
    /// `dir` is created even if no class is selected.
    pub fn write_manifest_for(
        &self,
        dir: &Utf8Path,
        mut filter: impl FnMut(&TestClass) -> bool,
    ) -> io::Result<Vec<Utf8PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for class in self.classes.values().filter(|c| filter(c)) {
            let relative = class_path_for_name(class.name());
            let path = dir.join(&relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, class.name())?;
            written.push(relative);
        }
        debug!("wrote {} class markers to {dir}", written.len());
        Ok(written)
    }
}

impl FromIterator<Arc<TestClass>> for ClassRegistry {
    fn from_iter<T: IntoIterator<Item = Arc<TestClass>>>(iter: T) -> Self {
        let mut registry = Self::new();
        for class in iter {
            registry.register(class);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest() {
        let registry: ClassRegistry = [
            TestClass::builder("a.b.C").build(),
            TestClass::builder("D").build(),
        ]
        .into_iter()
        .collect();
        assert_eq!(registry.len(), 2);

        let dir = camino_tempfile::tempdir().unwrap();
        let written = registry.write_manifest(dir.path()).unwrap();
        assert_eq!(
            written,
            vec![
                Utf8PathBuf::from("D.class"),
                ["a", "b", "C.class"].iter().collect(),
            ]
        );
        assert!(dir.path().join("a/b/C.class").is_file());
        assert!(dir.path().join("D.class").is_file());
    }

    #[test]
    fn manifest_filtered() {
        let registry: ClassRegistry = [
            TestClass::builder("a.A").build(),
            TestClass::builder("b.B").build(),
        ]
        .into_iter()
        .collect();
        let dir = camino_tempfile::tempdir().unwrap();
        registry
            .write_manifest_for(dir.path(), |c| c.name().starts_with("b."))
            .unwrap();
        assert!(!dir.path().join("a/A.class").exists());
        assert!(dir.path().join("b/B.class").is_file());
    }

    #[test]
    fn empty_manifest_creates_dir() {
        let tmp = camino_tempfile::tempdir().unwrap();
        let dir = tmp.path().join("classes");
        let written = ClassRegistry::new().write_manifest(&dir).unwrap();
        assert!(written.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn register_replaces() {
        let mut registry = ClassRegistry::new();
        assert!(registry.register(TestClass::builder("X").build()).is_none());
        let previous = registry.register(TestClass::builder("X").abstract_class().build());
        assert!(!previous.unwrap().is_abstract());
        assert!(registry.get("X").unwrap().is_abstract());
    }
}
