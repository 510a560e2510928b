// world-restore/src/utils/logging.rs
use chrono::{Local, NaiveDate};
use std::fmt as stdfmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

use crate::config::PLUGIN_NAME;

/// Emits an INFO event tagged as a successful outcome.
macro_rules! success {
    ($($arg:tt)+) => {
        ::tracing::info!(outcome = "success", $($arg)+)
    };
}
pub(crate) use success;

const OUTCOME_FIELD: &str = "outcome";

/// Collects an event's message and fields, noting a success outcome.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<String>,
    success: bool,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == OUTCOME_FIELD {
            self.success = value == "success";
        } else if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if field.name() != OUTCOME_FIELD {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

fn level_label(level: &Level, success: bool) -> &'static str {
    if success {
        return "SUCCESS";
    }
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// `<timestamp> [<LEVEL>] <message> <fields>`, where events emitted through
/// [`success!`] carry the `SUCCESS` level.
pub struct LevelFormat;

impl<S, N> FormatEvent<S, N> for LevelFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        write!(
            writer,
            "{} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_label(event.metadata().level(), visitor.success),
            visitor.message
        )?;
        for field in &visitor.fields {
            write!(writer, " {}", field)?;
        }
        writeln!(writer)
    }
}

/// Keeps the file writer alive for the duration of the run.
pub struct LogSession {
    _guard: Option<WorkerGuard>,
    pub file: Option<PathBuf>,
    pub file_error: Option<String>,
}

pub fn log_dir(server_dir: &Path) -> PathBuf {
    server_dir.join("logs").join(PLUGIN_NAME)
}

pub fn log_file_name(date: NaiveDate) -> String {
    format!(
        "{}_restore_{}.log",
        PLUGIN_NAME.to_lowercase(),
        date.format("%Y%m%d")
    )
}

fn file_appender(dir: &Path, name: &str) -> Result<RollingFileAppender, String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create log directory {}: {}", dir.display(), e))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|e| format!("Failed to open log file in {}: {}", dir.display(), e))
}

/// Installs the global subscriber: console output plus a dated file under
/// `<server>/logs/EasyBackuper`. DEBUG is only enabled in debug mode unless
/// `RUST_LOG` says otherwise. A log file that cannot be opened leaves the
/// console layer in place.
pub fn init_subscriber(server_dir: &Path, debug: bool) -> LogSession {
    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let dir = log_dir(server_dir);
    let name = log_file_name(Local::now().date_naive());

    let (file_layer, guard, file, file_error) = match file_appender(&dir, &name) {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .event_format(LevelFormat)
                .with_writer(non_blocking);
            (Some(layer), Some(guard), Some(dir.join(&name)), None)
        }
        Err(e) => (None, None, None, Some(e)),
    };

    let _ = registry()
        .with(env_filter)
        .with(fmt::layer().event_format(LevelFormat))
        .with(file_layer)
        .try_init();

    LogSession {
        _guard: guard,
        file,
        file_error,
    }
}
