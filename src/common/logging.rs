//! Logging and tracing configuration
//!
//! Logs always go to stderr so that framework output streamed to stdout in
//! verbose mode is not interleaved with log records. An optional log file
//! receives the same events with full detail.

use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "scout=info,warn";

/// Default filter with `--verbose`
const VERBOSE_FILTER: &str = "scout=debug,info";

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    })
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
}

/// Initialize tracing for the CLI
///
/// If `log_file` is given, events are also appended to it. Returns the path
/// actually used for file logging, if any.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Warning: Could not create log directory: {}", e);
            }
        }

        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true);

                tracing_subscriber::registry()
                    .with(filter(verbose))
                    .with(file_layer)
                    .with(stderr_layer())
                    .init();

                return Some(path.to_path_buf());
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file: {}", e);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(stderr_layer())
        .init();

    None
}
