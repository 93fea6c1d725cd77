//! Logging infrastructure - structured tracing of marshaling events
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log level, overridable through `RUST_LOG`
//! - Zero-cost when disabled
//! - Console or file output, human readable or JSON

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::layout::Layout;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer flushing for the process lifetime
static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console output when `None`
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // VALIST_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("VALIST_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // VALIST_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("VALIST_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("VALIST_LOG_JSON").is_ok();
        config.show_spans = std::env::var("VALIST_LOG_SPANS").is_ok();
        config
    }

    /// Verbose logging for debugging marshaling issues
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

/// Level from its lowercase or uppercase name
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with default configuration
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration; later calls are no-ops
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "ffi_valist={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.log_path.as_deref().map(Path::new) {
            Some(path) => {
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "ffi_valist.log".to_string());
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                fmt::writer::BoxMakeWriter::new(writer)
            }
            None => fmt::writer::BoxMakeWriter::new(io::stderr),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions));
        let layer = if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        };

        // Another subscriber may already be installed by the host application
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Marshaling events
// ============================================================================

/// Log scope opened
#[inline]
pub fn log_scope_open(scope: u64) {
    tracing::debug!(event = "scope_open", scope, "Scope opened");
}

/// Log scope released
#[inline]
pub fn log_scope_close(scope: u64, released_bytes: usize) {
    tracing::debug!(
        event = "scope_close",
        scope,
        released_bytes,
        "Scope closed"
    );
}

/// Log segment allocation
#[inline]
pub fn log_segment_alloc(scope: u64, size: usize, address: usize) {
    tracing::trace!(
        event = "segment_alloc",
        scope,
        size_bytes = size,
        address,
        "Segment allocated"
    );
}

/// Log argument appended
#[inline]
pub fn log_append(target: &str, index: usize, layout: &Layout, in_registers: bool, indirect: bool) {
    tracing::trace!(
        event = "append",
        target_abi = target,
        index,
        layout = %layout,
        in_registers,
        indirect,
        "Argument appended"
    );
}

/// Log list finalized
#[inline]
pub fn log_finalize(scope: u64, args: usize, header: usize) {
    tracing::debug!(
        event = "finalize",
        scope,
        args,
        header,
        "Argument list finalized"
    );
}

/// Log argument read
#[inline]
pub fn log_read(index: usize, layout: &Layout) {
    tracing::trace!(event = "read", index, layout = %layout, "Argument read");
}

/// Log native function call
pub fn log_downcall(symbol: &str, arg_count: usize) {
    tracing::debug!(
        event = "downcall",
        function = symbol,
        args = arg_count,
        "Native function called"
    );
}

/// Log upcall dispatch
pub fn log_upcall(stub: usize, arg_count: usize) {
    tracing::debug!(
        event = "upcall",
        stub,
        args = arg_count,
        "Upcall dispatched"
    );
}

/// Log linker error
pub fn log_link_error(name: &str, error: &str) {
    tracing::warn!(event = "link_error", symbol = name, error, "Link error");
}
