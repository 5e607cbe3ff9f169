//! # tnc-telemetry
//!
//! Diagnostic logging for the TNC runtime (spec §2 C13).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tnc_telemetry::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     // tracing events now reach stderr, filtered by TNC_LOG_LEVEL.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TNC_LOG_LEVEL` | `info` | Filter passed to `tracing_subscriber::EnvFilter` |

use std::sync::Arc;
use tnc_types::Severity;

/// A pluggable, severity-tagged log sink (spec §4.2 `log_message`, §9).
/// Plugins and the policy engine's `log` statement call through this trait
/// rather than writing to a fixed stream, so an embedding application can
/// redirect diagnostics anywhere it likes.
pub trait LogHook: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Default sink: routes every severity through `tracing`, which in turn
/// defaults to standard error (spec §9: "a default that writes to standard
/// error").
pub struct TracingLogHook;

impl LogHook for TracingLogHook {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Err => tracing::error!(target: "tnc", "{message}"),
            Severity::Warning => tracing::warn!(target: "tnc", "{message}"),
            Severity::Notice => tracing::info!(target: "tnc", "{message}"),
            Severity::Info => tracing::info!(target: "tnc", "{message}"),
            Severity::Debug => tracing::debug!(target: "tnc", "{message}"),
        }
    }
}

/// Shared handle to the active log hook, cloned into every host/engine that
/// needs to emit diagnostics.
pub type SharedLogHook = Arc<dyn LogHook>;

/// The default shared hook, built fresh on each call so callers don't have
/// to thread a static through construction.
pub fn default_log_hook() -> SharedLogHook {
    Arc::new(TracingLogHook)
}

/// Install a `tracing_subscriber` that writes to stderr, filtered by
/// `TNC_LOG_LEVEL` (defaulting to `info`). Safe to call more than once; only
/// the first call takes effect.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TNC_LOG_LEVEL")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capture(std::sync::Mutex<Vec<(Severity, String)>>);

    impl LogHook for Capture {
        fn log(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    #[test]
    fn custom_hook_receives_messages() {
        let hook = Capture(std::sync::Mutex::new(Vec::new()));
        hook.log(Severity::Err, "boom");
        let seen = hook.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "boom");
    }

    #[test]
    fn default_hook_does_not_panic() {
        let hook = default_log_hook();
        hook.log(Severity::Debug, "no panic expected");
    }
}
