use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// `2021-01-19 10:32:07,114 : message`
struct TimestampColon;

impl<S, N> FormatEvent<S, N> for TimestampColon
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} : ", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Build the run's subscriber. The log file is truncated; `level` is an
/// `EnvFilter` directive such as `debug` or `firds_extract=info`.
pub fn file_subscriber(path: &Path, level: &str) -> Result<impl Subscriber + Send + Sync> {
    let filter = EnvFilter::try_new(level).map_err(|e| {
        Error::Config(config::ConfigError::Message(format!(
            "invalid log level {level:?}: {e}"
        )))
    })?;
    let file = File::create(path).map_err(|e| Error::io(path, e))?;

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .event_format(TimestampColon)
        .finish())
}
