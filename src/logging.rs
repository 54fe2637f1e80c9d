use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event format emitting the structured dialect the bot itself watches:
/// `YYYY-MM-DD HH:MM:SS,mmm - name - LEVEL - message`
struct DialectFormat {
    name: String,
}

impl<S, N> FormatEvent<S, N> for DialectFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(
            writer,
            "{} - {} - {} - ",
            now.format("%Y-%m-%d %H:%M:%S,%3f"),
            self.name,
            event.metadata().level()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global logger, appending to the file the bot watches as
/// its own source
pub fn init(path: &Path, name: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .event_format(DialectFormat {
            name: name.to_string(),
        })
        .with_writer(Arc::new(file))
        .init();

    Ok(())
}
