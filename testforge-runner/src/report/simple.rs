// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ReportState, TestReport};
use crate::{
    errors::{DisplayErrorChain, ReportError, SuiteError, TestFailure},
    helpers::plural,
};
use owo_colors::{OwoColorize, Style};
use serde::{Deserialize, Serialize};
use std::io::Write;
use swrite::{SWrite, swrite};

/// A report that prints results to standard output.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimpleReport {
    state: ReportState,
    #[serde(skip)]
    styles: Styles,
    #[serde(skip)]
    output: ReportOutput,
    #[serde(skip)]
    current_printed: bool,
}

impl SimpleReport {
    /// Creates a new simple report.
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn new_captured() -> Self {
        Self {
            output: ReportOutput::Buffer(String::new()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn captured(&self) -> &str {
        match &self.output {
            ReportOutput::Buffer(buf) => buf,
            ReportOutput::Stdout => "",
        }
    }

    fn write_line(&mut self, line: &str) {
        match &mut self.output {
            ReportOutput::Stdout => {
                // Console output is best-effort.
                let mut stdout = std::io::stdout().lock();
                _ = writeln!(stdout, "{line}");
            }
            #[cfg(test)]
            ReportOutput::Buffer(buf) => {
                buf.push_str(line);
                buf.push('\n');
            }
        }
    }

    fn status_line(&self, status: &str, style: Style, test: &str) -> String {
        let mut line = String::new();
        swrite!(line, "{:>12} ", status.style(style));
        if let Some(suite) = self.state.current_suite() {
            swrite!(line, "{} ", suite.style(self.styles.suite));
        }
        swrite!(line, "{test}");
        line
    }
}

impl TestReport for SimpleReport {
    fn init(&mut self, output_dir: &camino::Utf8Path) -> Result<(), ReportError> {
        self.state.init(output_dir);
        if supports_color::on_cached(supports_color::Stream::Stdout).is_some() {
            self.styles.colorize();
        }
        Ok(())
    }

    fn start_run(&mut self, count: usize) {
        self.state.start_run(count);
        let line = format!(
            "{:>12} {} {}",
            "Starting".style(self.styles.pass),
            count.style(self.styles.count),
            plural::suites_str(count),
        );
        self.write_line(&line);
    }

    fn start_suite(&mut self, name: &str) {
        self.state.start_suite(name);
    }

    fn start_test(&mut self, name: &str) {
        self.state.start_test(name);
        self.current_printed = false;
    }

    fn failure(&mut self, name: &str, failure: &TestFailure) {
        self.state.failure(name);
        self.current_printed = true;
        let line = format!(
            "{}\n{:>12} {failure}",
            self.status_line("FAIL", self.styles.fail, name),
            "",
        );
        self.write_line(&line);
    }

    fn skip(&mut self, name: &str) {
        self.state.skip(name);
        self.current_printed = true;
        let line = self.status_line("SKIP", self.styles.skip, name);
        self.write_line(&line);
    }

    fn end_test(&mut self, name: &str) {
        self.state.end_test(name);
        // Skips and failures were already printed.
        if !std::mem::take(&mut self.current_printed) {
            let line = self.status_line("PASS", self.styles.pass, name);
            self.write_line(&line);
        }
    }

    fn suite_error(&mut self, name: &str, error: &SuiteError) {
        self.state.suite_error(name);
        let line = format!(
            "{:>12} {} {}",
            "ERROR".style(self.styles.fail),
            name.style(self.styles.suite),
            DisplayErrorChain::new(error),
        );
        self.write_line(&line);
    }

    fn end_suite(&mut self) -> Result<(), ReportError> {
        self.state.end_suite();
        Ok(())
    }

    fn stop_run(&mut self) -> Result<(), ReportError> {
        let state = &self.state;
        let summary_style = if state.suites_failed() > 0 || state.suites_errored() > 0 {
            self.styles.fail
        } else if state.suites_run() == 0 {
            self.styles.skip
        } else {
            self.styles.pass
        };

        let mut line = String::new();
        swrite!(line, "{}\n", "─".repeat(12));
        swrite!(
            line,
            "{:>12} {} {} run: {} {}, {} passed, {} failed, {} skipped",
            "Summary".style(summary_style),
            state.suites_run().style(self.styles.count),
            plural::suites_str(state.suites_run()),
            state.tests_run().style(self.styles.count),
            plural::tests_str(state.tests_run()),
            state.tests_passed().style(self.styles.pass),
            state.tests_failed().style(self.styles.fail),
            state.tests_skipped().style(self.styles.skip),
        );
        for suite in state.failed_suites() {
            swrite!(line, "\n{:>12} {}", "FAILED".style(self.styles.fail), suite);
        }
        for suite in state.errored_suites() {
            swrite!(line, "\n{:>12} {}", "ERRORED".style(self.styles.fail), suite);
        }
        self.write_line(&line);
        Ok(())
    }

    fn state(&self) -> &ReportState {
        &self.state
    }
}

#[derive(Clone, Debug, Default)]
enum ReportOutput {
    #[default]
    Stdout,
    #[cfg(test)]
    Buffer(String),
}

#[derive(Clone, Debug, Default)]
struct Styles {
    pass: Style,
    fail: Style,
    skip: Style,
    count: Style,
    suite: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.count = Style::new().bold();
        self.suite = Style::new().magenta().bold();
    }
}
