//! Logging and tracing utilities for bgfkit
//!
//! Decoders emit `tracing` events; binaries install a subscriber once through
//! [`init_with_config`]. `RUST_LOG` always overrides the configured default
//! filter.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "warn,bgfkit=info";

/// Initialize tracing with a custom configuration
///
/// Multiple calls are safe and will be ignored.
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .with_writer(std::io::stderr);

        // Another subscriber may already be installed by an embedding application
        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TracingConfig {
    /// Map a `-v` count onto a default filter
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.default_level = match verbose {
            0 => DEFAULT_FILTER.to_string(),
            1 => "info,bgfkit=debug".to_string(),
            _ => "debug,bgfkit=trace".to_string(),
        };
        self.show_thread_ids = verbose > 1;
        self
    }
}

/// Macros for common logging patterns
#[macro_export]
macro_rules! log_parse_start {
    ($parser:expr, $path:expr) => {
        tracing::info!(
            parser = %$parser,
            path = %$path.display(),
            "Starting parse"
        );
    };
}

#[macro_export]
macro_rules! log_parse_complete {
    ($parser:expr, $duration:expr, $items:expr) => {
        tracing::info!(
            parser = %$parser,
            duration_ms = %$duration.as_millis(),
            items = %$items,
            "Parse complete"
        );
    };
}

#[macro_export]
macro_rules! log_parse_error {
    ($parser:expr, $error:expr) => {
        tracing::error!(
            parser = %$parser,
            error = %$error,
            "Parse failed"
        );
    };
}
