use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the analysis API (e.g., "http://127.0.0.1:8022").
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Cadence between successive status queries, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive failed status queries tolerated before giving up on the server.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Path of the local file holding the current-job snapshot.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Number of top-ranked findings shown individually in a report.
    #[serde(default = "default_top_findings")]
    pub top_findings: usize,

    /// Probability mass (percentage points) at or below which the aggregated
    /// "other findings" bucket is dropped from a report.
    #[serde(default = "default_remainder_epsilon")]
    pub remainder_epsilon: f64,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8022".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_consecutive_failures() -> u32 {
    20
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("medscan_current_analysis.json")
}

fn default_top_findings() -> usize {
    3
}

fn default_remainder_epsilon() -> f64 {
    1.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            snapshot_path: default_snapshot_path(),
            top_findings: default_top_findings(),
            remainder_epsilon: default_remainder_epsilon(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `MEDSCAN_`-prefixed environment variables,
    /// reading a `.env` file first when one is present.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("MEDSCAN_").from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
