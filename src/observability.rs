//! Diagnostics for the compression pipeline.
//!
//! The tag builder and the padding logic make data-dependent decisions that are
//! invisible in the output bytes. `log_metric!` records those decisions as one
//! structured line through the `log` facade; the calls are compiled out of
//! release builds. `enable_verbose_logging` installs a simple `env_logger` sink
//! for callers that have no logger of their own.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

/// Logs a structured key-value metric line at `debug` level, only in debug builds.
///
/// # Example
/// ```
/// use meshpack::log_metric;
/// let leaves = 3;
/// log_metric!("event"="compute_tags", "table"="position", "leaves"=&leaves);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("MESHPACK_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `info`-level logger printing `[LEVEL] message`, optionally
/// appending to `log_file`. Only the first call has any effect.
pub fn enable_verbose_logging(log_file: Option<&str>) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(LevelFilter::Info);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(filename) = log_file {
            match OpenOptions::new().append(true).create(true).open(filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => eprintln!("meshpack: cannot open log file {}: {}", filename, e),
            }
        }

        let _ = builder.try_init();
    });
}
