//! Dashboard Configuration Module
//!
//! Provides deployment configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `THERMOWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `thermowatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(DashboardConfig::load());
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().analysis.outlier_threshold;
//! ```

pub mod defaults;
pub mod settings;

pub use settings::*;

use std::sync::OnceLock;

/// Global dashboard configuration, initialized once at startup.
static CONFIG: OnceLock<DashboardConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: DashboardConfig) {
    if CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Panics if `init()` has not been called. This is intentional — a missing
/// config is a fatal startup error, not a recoverable condition.
pub fn get() -> &'static DashboardConfig {
    CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized.
///
/// Useful for tests and optional config paths.
pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}
