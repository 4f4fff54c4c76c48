use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One century; longer windows cannot be turned into a date.
pub const MAX_PATTERN_WINDOW_DAYS: i64 = 36_500;

/// Tunables for the reporting layer, read from `config.json` next to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// How far back deviation pattern analysis looks.
    pub pattern_window_days: i64,
    /// Default occurrence threshold for `ops patterns`.
    pub min_pattern_occurrences: usize,
    /// Threshold used for the patterns embedded in a job situation report.
    pub situation_pattern_min_occurrences: usize,
    pub recent_event_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pattern_window_days: 90,
            min_pattern_occurrences: 3,
            situation_pattern_min_occurrences: 2,
            recent_event_limit: 20,
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<AnalyticsConfig> {
    if !path.exists() {
        return Ok(AnalyticsConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: AnalyticsConfig = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    if !(1..=MAX_PATTERN_WINDOW_DAYS).contains(&config.pattern_window_days) {
        anyhow::bail!(
            "pattern_window_days must be between 1 and {MAX_PATTERN_WINDOW_DAYS}, got {}",
            config.pattern_window_days
        );
    }
    Ok(config)
}
