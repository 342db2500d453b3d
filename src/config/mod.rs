use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once at startup from the environment.
/// Every field has a sensible default so a bare `.env` still runs.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the terminal bridge
    pub bridge_url: String,
    /// Directory holding per-instrument daily bar files
    pub data_dir: PathBuf,
    /// JSON array of every screenable instrument code
    pub universe_file: PathBuf,
    /// Candidate file shared between the screener and the scheduler
    pub candidate_file: PathBuf,
    /// Cash committed per order
    pub buy_amount: i64,
    /// Maximum relative gap between live and reference price
    pub deviation_threshold: f64,
    /// Seconds between scheduling ticks
    pub tick_interval_secs: u64,
    /// Seconds between screening passes
    pub screen_interval_secs: u64,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self {
            bridge_url: env::var("BRIDGE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8999".to_string()),
            data_dir: env::var("STOCK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("stock_data")),
            universe_file: env::var("UNIVERSE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("all_stock_codes.json")),
            candidate_file: env::var("CANDIDATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("filtered_candidates.json")),
            buy_amount: env::var("BUY_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100_000),
            deviation_threshold: env::var("DEVIATION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.008),
            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            screen_interval_secs: env::var("SCREEN_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
