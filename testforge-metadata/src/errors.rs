// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing an [`Invocation`](crate::Invocation) from its command-line
/// form.
#[derive(Debug)]
pub struct InvocationParseError {
    input: String,
    error: serde_json::Error,
}

impl InvocationParseError {
    pub(crate) fn new(input: impl Into<String>, error: serde_json::Error) -> Self {
        Self {
            input: input.into(),
            error,
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for InvocationParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid creator invocation `{}`", self.input)
    }
}

impl error::Error for InvocationParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}
