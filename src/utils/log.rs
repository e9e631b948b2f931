// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fmt as std_fmt, path::Path};

use anyhow::{Result, anyhow};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use super::ensure_dir_exists;

struct SimpleFormatter;

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let level = *event.metadata().level();
        write!(writer, "[{}] ", level)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Stderr logging, plus a plain-text file layer when `log_path` is set. The
/// returned guard must live until exit so buffered file lines get flushed.
pub fn init_logging(verbose: bool, log_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .event_format(SimpleFormatter);

    let mut guard = None;

    let file_layer = match log_path {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log filename"))?;
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            ensure_dir_exists(directory)?;

            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
            guard = Some(g);

            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .event_format(SimpleFormatter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing_log::LogTracer::init().ok();

    Ok(guard)
}
