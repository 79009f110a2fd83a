use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{Error, Period, Result};

use crate::screener::ScreenerConfig;

/// Top-level screen config file (TOML).
///
/// Example `config/screen.toml`:
/// ```toml
/// universe = ["AAPL", "MSFT", "NVDA"]
///
/// [engine]
/// max_concurrency = 8
/// fetch_timeout_secs = 30
/// refresh_interval_secs = 3600
/// lookback = "1y"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenFileConfig {
    /// Tickers evaluated on every run, in display order.
    pub universe: Vec<String>,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on tickers fetched at the same time.
    pub max_concurrency: usize,
    /// Applies to each provider call separately.
    pub fetch_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    /// History requested per ticker. Must cover at least 201 sessions.
    pub lookback: Period,
    pub run_on_startup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            fetch_timeout_secs: 30,
            refresh_interval_secs: 3600,
            lookback: Period::OneYear,
            run_on_startup: true,
        }
    }
}

impl EngineConfig {
    pub fn screener_config(&self) -> ScreenerConfig {
        ScreenerConfig {
            max_concurrency: self.max_concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            lookback: self.lookback,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

impl ScreenFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read screen config at '{path}': {e}"));
        Self::from_toml_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse screen config at '{path}': {e}"))
    }

    /// Parse and normalize: tickers are trimmed and upper-cased, blanks and
    /// repeats are dropped, first occurrence wins.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut cfg: ScreenFileConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        cfg.universe = cfg
            .universe
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        if cfg.engine.max_concurrency == 0 {
            return Err(Error::Config("engine.max_concurrency must be at least 1".into()));
        }
        if matches!(
            cfg.engine.lookback,
            Period::ThreeMonths | Period::SixMonths | Period::YearToDate
        ) {
            return Err(Error::Config(format!(
                "engine.lookback '{}' is too short for a 200-day average",
                cfg.engine.lookback
            )));
        }
        Ok(cfg)
    }
}
