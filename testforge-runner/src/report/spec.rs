// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Report;
use crate::errors::ReportSpecError;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The current version of the report spec file format.
pub const REPORT_SPEC_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ReportSpecRef<'a> {
    format_version: u32,
    report: &'a Report,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportSpecHeader {
    format_version: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportSpecOwned {
    report: Report,
}

/// Writes `report` to a report spec file at `path`, replacing it atomically.
pub fn write_report_spec(path: &Utf8Path, report: &Report) -> Result<(), ReportSpecError> {
    let spec = ReportSpecRef {
        format_version: REPORT_SPEC_FORMAT_VERSION,
        report,
    };
    let json = serde_json::to_string_pretty(&spec).map_err(ReportSpecError::Serialize)?;

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| file.write_all(json.as_bytes()))
        .map_err(|error| ReportSpecError::Write {
            path: path.to_owned(),
            error,
        })
}

/// Reads a report from the report spec file at `path`.
pub fn read_report_spec(path: &Utf8Path) -> Result<Report, ReportSpecError> {
    let json = std::fs::read_to_string(path).map_err(|error| ReportSpecError::Read {
        path: path.to_owned(),
        error,
    })?;

    let header: ReportSpecHeader = deserialize(path, &json)?;
    if header.format_version != REPORT_SPEC_FORMAT_VERSION {
        return Err(ReportSpecError::UnsupportedFormatVersion {
            path: path.to_owned(),
            found: header.format_version,
            supported: REPORT_SPEC_FORMAT_VERSION,
        });
    }

    let spec: ReportSpecOwned = deserialize(path, &json)?;
    Ok(spec.report)
}

fn deserialize<'de, T: Deserialize<'de>>(
    path: &Utf8Path,
    json: &'de str,
) -> Result<T, ReportSpecError> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        ReportSpecError::Deserialize {
            path: path.to_owned(),
            error,
        }
    })
}
