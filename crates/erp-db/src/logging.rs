//! # Logging
//!
//! Tracing subscriber setup shared by the seed binary and embedding
//! applications.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages everywhere
//! - `RUST_LOG=erp_db=trace` - Trace the database layer only
//! - Otherwise the configured filter (`[logging] filter`) applies

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config file set one.
pub const DEFAULT_FILTER: &str = "info,erp_db=debug,sqlx=warn";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns `false` if a
/// subscriber was already installed (e.g. by a test harness or the host
/// application), in which case nothing changes.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
