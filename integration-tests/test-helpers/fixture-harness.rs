// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Child process harness over the fixture classes.

use std::sync::Arc;

fn main() {
    testforge_runner::entry::main(Arc::new(integration_tests::fixture_registry()));
}
