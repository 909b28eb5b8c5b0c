//! System-wide default constants.
//!
//! Centralises the tunables so they live in one place instead of being
//! scattered across the modules that consume them.

// ============================================================================
// Analysis
// ============================================================================

/// Z-score threshold above which a reading is flagged as an outlier.
pub const OUTLIER_THRESHOLD: f64 = 3.0;

/// Sliding-window size for the moving-average trend.
pub const TREND_WINDOW: usize = 5;

/// Maximum outliers included in a device overview payload.
pub const OVERVIEW_OUTLIER_LIMIT: usize = 5;

/// Maximum outliers quoted verbatim in the LLM data summary.
pub const SUMMARY_OUTLIER_LIMIT: usize = 3;

// ============================================================================
// Polling
// ============================================================================

/// Interval between background snapshot refreshes (seconds).
pub const REFRESH_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Data sources
// ============================================================================

/// Default JSON data file path.
pub const DATA_FILE: &str = "data/temperature_data.json";

/// Bounded retry attempts before a source is reported unavailable.
pub const SOURCE_MAX_RETRIES: u32 = 3;

/// Base backoff between source retries (ms). Doubles per attempt.
pub const SOURCE_RETRY_BACKOFF_MS: u64 = 250;

/// MySQL connection acquire timeout (seconds).
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// MySQL pool size. The dashboard is a single-process, low-QPS reader.
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// Cap on readings loaded per device from the table backend.
pub const DB_READINGS_LIMIT: u32 = 1_000;

// ============================================================================
// LLM
// ============================================================================

/// Default GGUF model path for the local backend.
pub const LOCAL_MODEL_PATH: &str = "models/qwen-0.6b.gguf";

/// Context window for the local model.
pub const LOCAL_MODEL_CTX: usize = 2_048;

/// Default remote chat-completion model name.
pub const REMOTE_MODEL: &str = "gpt-3.5-turbo";

/// Generation cap — short reports, no essays.
pub const LLM_MAX_TOKENS: usize = 600;

/// Sampling temperature.
pub const LLM_TEMPERATURE: f64 = 0.75;

/// HTTP timeout for remote completion requests (seconds).
pub const LLM_HTTP_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";
