use console::style;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

pub struct SubdFormatter;

impl<S, N> FormatEvent<S, N> for SubdFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let symbol = match *event.metadata().level() {
            Level::TRACE => style("[ ]").dim(),
            Level::DEBUG => style("[?]").blue(),
            Level::INFO => style("[+]").green().bold(),
            Level::WARN => style("[*]").yellow().bold(),
            Level::ERROR => style("[-]").red().bold(),
        };

        write!(writer, "{} ", symbol.for_stderr())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`. DNS client
/// internals stay at warn either way.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hickory_proto=warn,hickory_client=warn", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(SubdFormatter)
        .try_init();
}
