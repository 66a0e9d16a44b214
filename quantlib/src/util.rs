use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{OrchestratorConfig, SchedulerConfig};
use crate::errors::ConfigError;
use crate::models::{HighlightThresholds, Interval, Matrix, Symbol};
use crate::tradingview::objects::TradingViewSettings;

/// Read from the working directory when no path is given.
pub const SETTINGS_FILE: &str = "settings.json";

const DEFAULT_SYMBOLS: [&str; 21] = [
    "AUDCAD", "AUDCHF", "AUDJPY", "AUDUSD", "CADCHF", "CADJPY", "CHFJPY", "EURAUD", "EURCAD",
    "EURCHF", "EURGBP", "EURJPY", "EURUSD", "GBPAUD", "GBPCAD", "GBPCHF", "GBPJPY", "GBPUSD",
    "USDCAD", "USDCHF", "USDJPY",
];

fn default_symbols() -> Vec<Symbol> {
    DEFAULT_SYMBOLS.iter().map(|s| Symbol::from(*s)).collect()
}

fn default_intervals() -> Vec<Interval> {
    Interval::DEFAULT_COLUMNS.to_vec()
}

fn default_period_ms() -> u64 {
    10_000
}

fn default_fetch_timeout_ms() -> u64 {
    8_000
}

fn default_log_path() -> String {
    "logs/signal-matrix.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// Unknown keys are an error, including misspelled ones
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub tradingview: TradingViewSettings,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<Symbol>,
    #[serde(default = "default_intervals")]
    pub intervals: Vec<Interval>,

    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub run_immediately: bool,

    // Overrides for the thresholds otherwise derived from the column count
    #[serde(default)]
    pub score_threshold: Option<u32>,
    #[serde(default)]
    pub strong_threshold: Option<u32>,

    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tradingview: TradingViewSettings::default(),
            symbols: default_symbols(),
            intervals: default_intervals(),
            period_ms: default_period_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            run_immediately: false,
            score_threshold: None,
            strong_threshold: None,
            log_path: default_log_path(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&settings)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        // Building the matrix checks the axes
        self.matrix()?;

        if self.fetch_timeout_ms >= self.period_ms {
            log::warn!(
                "Fetch timeout ({} ms) is not shorter than the cycle period ({} ms), \
                 slow cycles will skip timer fires",
                self.fetch_timeout_ms,
                self.period_ms
            );
        }
        Ok(())
    }

    pub fn matrix(&self) -> Result<Matrix, ConfigError> {
        Matrix::new(self.symbols.clone(), self.intervals.clone())
    }

    pub fn thresholds(&self) -> Option<HighlightThresholds> {
        if self.score_threshold.is_none() && self.strong_threshold.is_none() {
            return None;
        }
        let derived = HighlightThresholds::for_columns(self.intervals.len());
        Some(HighlightThresholds {
            score: self.score_threshold.unwrap_or(derived.score),
            strong: self.strong_threshold.unwrap_or(derived.strong),
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            thresholds: self.thresholds(),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            period: Duration::from_millis(self.period_ms),
            run_immediately: self.run_immediately,
        }
    }
}

pub fn read_settings() -> Result<Settings, ConfigError> {
    Settings::load(SETTINGS_FILE)
}
