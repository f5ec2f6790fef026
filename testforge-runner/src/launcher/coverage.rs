// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ChildCommand;
use crate::errors::CoverageError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::{fmt, io::Write};
use tracing::info;
use walkdir::WalkDir;

/// Instruments child processes for coverage collection.
pub trait Coverage: fmt::Debug {
    /// Adds whatever the child needs to record coverage to `command`.
    fn add_command_line_arguments(&self, command: &mut ChildCommand);

    /// Returns the program that runs the child, given the default entry point program.
    fn runner_program(&self, default: &Utf8Path) -> Utf8PathBuf {
        default.to_owned()
    }

    /// Finishes the coverage session after all children have exited.
    fn stop_run(&mut self) -> Result<(), CoverageError>;
}

/// Collects LLVM source-based coverage profiles from children built with
/// `-C instrument-coverage`.
///
/// Each child writes its raw profile into the profile directory. When the run stops, an index of
/// the profiles is written next to them for `llvm-profdata merge` to consume.
#[derive(Clone, Debug)]
pub struct LlvmCoverage {
    profile_dir: Utf8PathBuf,
}

/// The environment variable the LLVM profiling runtime reads its output pattern from.
pub const LLVM_PROFILE_FILE_ENV: &str = "LLVM_PROFILE_FILE";

/// The name of the index file written by [`LlvmCoverage::stop_run`].
pub const COVERAGE_INDEX_FILE: &str = "coverage-index.json";

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CoverageIndex<'a> {
    profile_dir: &'a Utf8Path,
    profiles: Vec<Utf8PathBuf>,
}

impl LlvmCoverage {
    /// Creates a session that collects profiles into `profile_dir`.
    pub fn new(profile_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
        }
    }

    /// Returns the profile directory.
    pub fn profile_dir(&self) -> &Utf8Path {
        &self.profile_dir
    }

    /// Returns the path to the coverage index.
    pub fn index_path(&self) -> Utf8PathBuf {
        self.profile_dir.join(COVERAGE_INDEX_FILE)
    }

    fn collect_profiles(&self) -> Result<Vec<Utf8PathBuf>, CoverageError> {
        let mut profiles = Vec::new();
        for entry in WalkDir::new(&self.profile_dir).sort_by_file_name() {
            let entry = entry.map_err(|error| CoverageError::Collect {
                dir: self.profile_dir.clone(),
                error,
            })?;
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            if entry.file_type().is_file() && path.extension() == Some("profraw") {
                profiles.push(path.to_owned());
            }
        }
        Ok(profiles)
    }
}

impl Coverage for LlvmCoverage {
    fn add_command_line_arguments(&self, command: &mut ChildCommand) {
        // %p expands to the process ID and %m to the binary signature.
        let pattern = self.profile_dir.join("testforge-%p-%m.profraw");
        command.env([(LLVM_PROFILE_FILE_ENV, pattern.as_str())]);
    }

    fn stop_run(&mut self) -> Result<(), CoverageError> {
        std::fs::create_dir_all(&self.profile_dir).map_err(|error| CoverageError::Fs {
            file: self.profile_dir.clone(),
            error,
        })?;
        let profiles = self.collect_profiles()?;
        info!(
            "collected {} coverage profiles in {}",
            profiles.len(),
            self.profile_dir
        );

        let index = CoverageIndex {
            profile_dir: &self.profile_dir,
            profiles,
        };
        let index_path = self.index_path();
        atomicwrites::AtomicFile::new(&index_path, atomicwrites::AllowOverwrite)
            .write(|file| {
                serde_json::to_writer_pretty(&mut *file, &index)?;
                file.write_all(b"\n")
            })
            .map_err(|error| CoverageError::WriteIndex {
                path: index_path.clone(),
                error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profile_env_and_index() {
        let dir = camino_tempfile::tempdir().unwrap();
        let profile_dir = dir.path().join("coverage");
        let mut coverage = LlvmCoverage::new(&profile_dir);

        let mut command = ChildCommand::new("/bin/harness");
        coverage.add_command_line_arguments(&mut command);
        assert_eq!(
            coverage.runner_program(command.program()),
            Utf8PathBuf::from("/bin/harness")
        );

        std::fs::create_dir_all(profile_dir.join("nested")).unwrap();
        std::fs::write(profile_dir.join("testforge-1-abc.profraw"), "").unwrap();
        std::fs::write(profile_dir.join("nested/testforge-2-abc.profraw"), "").unwrap();
        std::fs::write(profile_dir.join("notes.txt"), "").unwrap();
        coverage.stop_run().unwrap();

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(coverage.index_path()).unwrap())
                .unwrap();
        assert_eq!(
            index["profiles"],
            serde_json::json!([
                profile_dir.join("nested/testforge-2-abc.profraw"),
                profile_dir.join("testforge-1-abc.profraw"),
            ])
        );
    }

    #[test]
    fn stop_without_profiles() {
        let dir = camino_tempfile::tempdir().unwrap();
        let mut coverage = LlvmCoverage::new(dir.path().join("never-created"));
        coverage.stop_run().unwrap();
        assert!(coverage.index_path().is_file());
    }
}
