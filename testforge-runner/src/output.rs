// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log output for launchers and child processes.

use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
    warn,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable that overrides the log filter, in
/// [`Targets`](tracing_subscriber::filter::Targets) syntax (for example
/// `testforge_runner=debug`).
pub const LOG_ENV: &str = "TESTFORGE_LOG";

static INIT_LOGGER: Once = Once::new();

/// Installs the global log subscriber, writing to stderr.
///
/// Logs at `INFO` and above by default, or `DEBUG` and above if `verbose` is set. Only the first
/// call in a process has any effect.
pub fn init_logging(verbose: bool) {
    INIT_LOGGER.call_once(|| {
        let mut styles = LogStyles::default();
        if supports_color::on_cached(supports_color::Stream::Stderr).is_some() {
            styles.colorize();
        }

        let default_level = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let level_str = std::env::var(LOG_ENV).unwrap_or_default();
        let (targets, parse_error) = if level_str.is_empty() {
            (Targets::new().with_default(default_level), None)
        } else {
            match level_str.parse::<Targets>() {
                Ok(targets) => (targets, None),
                Err(error) => (Targets::new().with_default(default_level), Some(error)),
            }
        };

        let layer = tracing_subscriber::fmt::layer()
            .event_format(SimpleFormatter { styles })
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();

        if let Some(error) = parse_error {
            warn!("ignoring invalid {LOG_ENV} value `{level_str}`: {error}");
        }
    });
}

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let (heading, heading_style) = match *event.metadata().level() {
            Level::ERROR => ("error", self.styles.error),
            Level::WARN => ("warning", self.styles.warning),
            Level::INFO => ("info", self.styles.info),
            Level::DEBUG => ("debug", self.styles.debug),
            Level::TRACE => ("trace", self.styles.trace),
        };
        write!(writer, "{}: ", heading.style(heading_style))?;

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            error: None,
        };
        event.record(&mut visitor);
        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    error: Option<fmt::Error>,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD
            && let Err(error) = write!(self.writer, "{value:?}")
        {
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
    }
}
