// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for testforge-runner.

use crate::pattern::tokenize_path;
use camino::Utf8PathBuf;
use std::{borrow::Cow, collections::BTreeMap};

/// The file extension of class marker files.
pub const CLASS_EXTENSION: &str = "class";

/// The sigil that introduces a property reference in child-process arguments.
pub const PROPERTY_SIGIL: char = '$';

/// The separator for pattern and group lists passed on the command line.
pub const LIST_SEPARATOR: char = ':';

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "suite" if `count` is 1, otherwise "suites".
    pub fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }

    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }
}

/// Escapes property sigils in `value` so that a child's property expander passes them through
/// unchanged.
pub fn escape_property_sigil(value: &str) -> Cow<'_, str> {
    if value.contains(PROPERTY_SIGIL) {
        Cow::Owned(value.replace('$', "$$"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Expands `${name}` references in `value` using `lookup`, and unescapes `$$` to `$`.
///
/// References that `lookup` cannot resolve, and unterminated references, are left as-is.
pub fn expand_properties<'a>(
    value: &'a str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Cow<'a, str> {
    if !value.contains(PROPERTY_SIGIL) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find(PROPERTY_SIGIL) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];
        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            match body.find('}') {
                Some(end) => {
                    let name = &body[..end];
                    match lookup(name) {
                        Some(expanded) => out.push_str(&expanded),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &body[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = tail;
                }
            }
        } else {
            out.push('$');
            rest = tail;
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Expands `${name}` references in every value of `properties`.
///
/// References resolve against the unexpanded properties first, then the environment. Expansion
/// is a single pass, so a property referring to another property receives its raw value.
pub fn expand_property_values(properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let lookup = |name: &str| {
        properties
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    };
    properties
        .iter()
        .map(|(key, value)| (key.clone(), expand_properties(value, lookup).into_owned()))
        .collect()
}

/// Splits a colon-separated list, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Joins a list with the colon separator.
pub fn join_list<S: AsRef<str>>(values: &[S]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(LIST_SEPARATOR);
        }
        out.push_str(value.as_ref());
    }
    out
}

/// Converts a class marker path relative to a classpath root (e.g. `a/b/C.class`) into a class
/// name (`a.b.C`).
///
/// Returns `None` if the path does not name a class file.
pub fn class_name_from_path(path: &str) -> Option<String> {
    let stem = path.strip_suffix(CLASS_EXTENSION)?.strip_suffix('.')?;
    let segments = tokenize_path(stem);
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

/// Converts a class name (`a.b.C`) into a marker path relative to a classpath root
/// (`a/b/C.class`).
pub fn class_path_for_name(name: &str) -> Utf8PathBuf {
    let mut path: Utf8PathBuf = name.split('.').collect();
    path.set_extension(CLASS_EXTENSION);
    path
}

/// Returns the simple (unqualified) part of a class name.
pub fn simple_class_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
