//! Logging
//!
//! The library only emits `tracing` events. Callers that want a severity
//! based sink (critical / verbose / very verbose) use [`Severity`] here to
//! install a subscriber and to report failures they receive.

use tracing_subscriber::{fmt, EnvFilter};

/// How much the caller wants to hear
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Verbose,
    VeryVerbose,
}

impl Severity {
    /// Map a `-v` count to a severity
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Severity::Critical,
            1 => Severity::Verbose,
            _ => Severity::VeryVerbose,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Severity::Critical => "error",
            Severity::Verbose => "info",
            Severity::VeryVerbose => "debug",
        }
    }
}

/// Install a stderr subscriber showing events up to `severity`.
///
/// `RUST_LOG` takes precedence when set. Does nothing if a global
/// subscriber is already installed.
pub fn init(severity: Severity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(severity.directive()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Report a message at the given severity
pub fn emit(severity: Severity, message: &str) {
    match severity {
        Severity::Critical => tracing::error!("{}", message),
        Severity::Verbose => tracing::info!("{}", message),
        Severity::VeryVerbose => tracing::debug!("{}", message),
    }
}
