// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytesize::ByteSize;
use std::{io, process::Command};
use tracing::warn;

/// Memory limits are not supported on Windows: the child runs without one.
pub(super) fn limit_memory(_cmd: &mut Command, max_memory: ByteSize) -> io::Result<()> {
    warn!("ignoring max-memory ({max_memory}): not supported on this platform");
    Ok(())
}
