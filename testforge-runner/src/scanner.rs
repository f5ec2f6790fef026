// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Walking a directory tree with include and exclude patterns.

use crate::{
    errors::ScanError,
    pattern::{match_path, match_pattern_start},
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Version control and operating system noise that is never scanned.
pub static DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.DS_Store",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzr",
    "**/.bzr/**",
    "**/.bzrignore",
];

/// Scans a base directory for files matching a set of include patterns and none of a set of
/// exclude patterns.
///
/// Patterns are matched against paths relative to the base directory, with
/// [`match_path`](crate::pattern::match_path) semantics.
#[derive(Clone, Debug)]
pub struct DirectoryScanner {
    base: Utf8PathBuf,
    includes: Vec<String>,
    excludes: Vec<String>,
    follow_symlinks: bool,
    case_sensitive: bool,
}

impl DirectoryScanner {
    /// Creates a new scanner over `base`.
    ///
    /// An empty include list includes everything. [`DEFAULT_EXCLUDES`] are always appended to
    /// `excludes`.
    ///
    /// Returns an error if `base` does not exist or is not a directory.
    pub fn new(
        base: impl Into<Utf8PathBuf>,
        includes: impl IntoIterator<Item = impl Into<String>>,
        excludes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ScanError> {
        let base = base.into();
        if !base.exists() {
            return Err(ScanError::BaseNotFound { base });
        }
        if !base.is_dir() {
            return Err(ScanError::BaseNotDirectory { base });
        }

        let mut includes: Vec<String> = includes.into_iter().map(Into::into).collect();
        if includes.is_empty() {
            includes.push("**".to_owned());
        }
        let mut excludes: Vec<String> = excludes.into_iter().map(Into::into).collect();
        excludes.extend(DEFAULT_EXCLUDES.iter().map(|s| (*s).to_owned()));

        Ok(Self {
            base,
            includes,
            excludes,
            follow_symlinks: true,
            case_sensitive: true,
        })
    }

    /// Sets whether symbolic links are followed. Defaults to true.
    ///
    /// If false, symbolic links are dropped from the scan entirely.
    pub fn follow_symlinks(&mut self, follow: bool) -> &mut Self {
        self.follow_symlinks = follow;
        self
    }

    /// Sets whether patterns are matched case-sensitively. Defaults to true.
    pub fn case_sensitive(&mut self, case_sensitive: bool) -> &mut Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Returns the base directory.
    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    /// Returns the include patterns.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Returns the exclude patterns, including the defaults.
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Walks the base directory and returns the included files, relative to the base directory
    /// and sorted.
    pub fn scan(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        let walker = WalkDir::new(&self.base)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_visit(entry));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|error| ScanError::Walk {
                base: self.base.clone(),
                error,
            })?;
            if entry.depth() == 0 || entry.file_type().is_dir() {
                continue;
            }
            let relative = self.relative_path(&entry)?;
            if self.is_included(relative.as_str()) && !self.is_excluded(relative.as_str()) {
                files.push(relative);
            }
        }

        files.sort_unstable();
        debug!(
            "scanned {}: {} files matched {:?}",
            self.base,
            files.len(),
            self.includes
        );
        Ok(files)
    }

    fn should_visit(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if !self.follow_symlinks && entry.path_is_symlink() {
            return false;
        }
        if !entry.file_type().is_dir() {
            return true;
        }

        let Some(relative) = entry
            .path()
            .strip_prefix(&self.base)
            .ok()
            .and_then(|p| p.to_str())
        else {
            // Let the main loop report the non-UTF-8 path.
            return true;
        };

        if self.is_excluded(relative) {
            debug!("not descending into excluded directory {relative}");
            return false;
        }
        self.is_included(relative) || self.could_hold_included(relative)
    }

    fn relative_path(&self, entry: &DirEntry) -> Result<Utf8PathBuf, ScanError> {
        let relative = entry
            .path()
            .strip_prefix(&self.base)
            .unwrap_or_else(|_| entry.path())
            .to_path_buf();
        Utf8PathBuf::try_from(relative).map_err(ScanError::NonUtf8Path)
    }

    fn is_included(&self, relative: &str) -> bool {
        self.includes
            .iter()
            .any(|pattern| match_path(pattern, relative, self.case_sensitive))
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.excludes
            .iter()
            .any(|pattern| match_path(pattern, relative, self.case_sensitive))
    }

    fn could_hold_included(&self, relative: &str) -> bool {
        self.includes
            .iter()
            .any(|pattern| match_pattern_start(pattern, relative, self.case_sensitive))
    }
}
