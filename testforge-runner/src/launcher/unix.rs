// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytesize::ByteSize;
use std::{io, os::unix::process::CommandExt, process::Command};

/// Limits the address space of the child to `max_memory` bytes.
pub(super) fn limit_memory(cmd: &mut Command, max_memory: ByteSize) -> io::Result<()> {
    let limit = max_memory.as_u64() as libc::rlim_t;
    unsafe {
        // setrlimit is async-signal-safe, so it may be called between fork and exec.
        cmd.pre_exec(move || {
            let rlimit = libc::rlimit {
                rlim_cur: limit,
                rlim_max: limit,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &rlimit) == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        })
    };
    Ok(())
}
