//! Logging infrastructure - structured tracing throughout the binding
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels via environment
//! - Zero-cost when disabled
//! - Structured `event = "..."` fields on every interop event

use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // TETHER_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("TETHER_LOG_LEVEL") {
            config.level = match level_str.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            };
        }

        // TETHER_LOG_SPANS: show span events
        config.show_spans = std::env::var("TETHER_LOG_SPANS").is_ok();

        config
    }
}

/// Initialize logging with default configuration
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("tether={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stdout)
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(cfg!(debug_assertions)),
            )
            .init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Interop-specific logging functions
// ============================================================================

/// Log a cross-boundary method call
#[inline]
pub fn log_call(method: &str, arg_count: usize) {
    use tracing::debug;
    debug!(
        event = "managed_call",
        method = method,
        args = arg_count,
        "Calling into managed runtime"
    );
}

/// Log heap collection completion
pub fn log_collect(collected: usize, live: usize) {
    use tracing::info;
    info!(
        event = "heap_collect",
        objects_collected = collected,
        objects_live = live,
        "Heap collection complete"
    );
}

/// Log a symbol cache miss that ended in a resolution failure
pub fn log_symbol_miss(kind: &str, name: &str) {
    use tracing::warn;
    warn!(
        event = "symbol_miss",
        kind = kind,
        name = name,
        "Symbol resolution failed"
    );
}
