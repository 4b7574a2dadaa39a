//! Tracing setup: stdout plus a daily rolling file under `<data_dir>/wagate/logs`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use super::config::get_data_dir;

const LOG_FILE_PREFIX: &str = "wagate.log";

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the returned guard alive or buffered
/// file output is lost on exit.
pub fn init_logger(default_level: &str) -> Option<WorkerGuard> {
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match get_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(e) => {
            eprintln!("File logging disabled: {}", e);
            (None, None)
        }
    };

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(stdout_layer)
        .with(file_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already installed (tests, embedding); keep the existing one.
        return guard;
    }
    let _ = tracing_log::LogTracer::init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        // An unparsable directive must not panic.
        let _filter = build_filter("[[not a directive");
        let _filter = build_filter("wagate_lib=debug,info");
    }
}
