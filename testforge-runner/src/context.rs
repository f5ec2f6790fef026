// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Properties and settings visible to running tests.
//!
//! Tests receive a [`TestContext`] explicitly. For code that reads properties ambiently, a
//! process-wide property table is also maintained; it is only ever changed through a
//! [`PropertyOverlay`], which restores the previous values when dropped.

use crate::errors::TestFailure;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

static SYSTEM_PROPERTIES: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());

fn system_properties_lock() -> MutexGuard<'static, BTreeMap<String, String>> {
    // A test that panicked while holding the lock leaves the table in a consistent state.
    SYSTEM_PROPERTIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Returns the value of a process-wide property.
pub fn system_property(name: &str) -> Option<String> {
    system_properties_lock().get(name).cloned()
}

/// Returns a snapshot of all process-wide properties.
pub fn system_properties() -> BTreeMap<String, String> {
    system_properties_lock().clone()
}

/// Overlays properties on the process-wide property table for as long as it is alive.
///
/// Dropping the overlay, including during unwinding, restores each overlaid key to its previous
/// value (or removes it if it was previously unset).
#[derive(Debug)]
#[must_use = "properties are restored as soon as the overlay is dropped"]
pub struct PropertyOverlay {
    saved: Vec<(String, Option<String>)>,
}

impl PropertyOverlay {
    /// Applies `properties` to the process-wide table.
    pub fn apply<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = system_properties_lock();
        let saved = properties
            .into_iter()
            .map(|(key, value)| {
                let key = key.into();
                let previous = table.insert(key.clone(), value.into());
                (key, previous)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for PropertyOverlay {
    fn drop(&mut self) {
        let mut table = system_properties_lock();
        // Restore in reverse so that a key overlaid twice ends up with its original value.
        for (key, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => {
                    table.insert(key, value);
                }
                None => {
                    table.remove(&key);
                }
            }
        }
    }
}

/// The context threaded to every test body and hook.
#[derive(Clone, Debug, Default)]
pub struct TestContext {
    properties: BTreeMap<String, String>,
    assertions_enabled: bool,
}

impl TestContext {
    /// Creates a new context.
    pub fn new(properties: BTreeMap<String, String>, assertions_enabled: bool) -> Self {
        Self {
            properties,
            assertions_enabled,
        }
    }

    /// Creates a context from a snapshot of the process-wide property table.
    pub fn from_system(assertions_enabled: bool) -> Self {
        Self::new(system_properties(), assertions_enabled)
    }

    /// Returns the value of a property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Returns all properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Returns true if assertions are enabled.
    pub fn assertions_enabled(&self) -> bool {
        self.assertions_enabled
    }

    /// Checks an assertion, if assertions are enabled.
    ///
    /// With assertions disabled this always succeeds.
    pub fn check(
        &self,
        condition: bool,
        message: impl FnOnce() -> String,
    ) -> Result<(), TestFailure> {
        if self.assertions_enabled && !condition {
            Err(TestFailure::assertion(message()))
        } else {
            Ok(())
        }
    }
}
