use std::time::Duration;

use thiserror::Error;

use crate::models::{Interval, Symbol};

/// Failure of a single (symbol, interval) lookup.
///
/// These never abort a cycle: the orchestrator downgrades the affected cell
/// to NEUTRAL and logs the error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("received non-success status code: {0}")]
    Status(u16),

    #[error("error parsing response: {0}")]
    Parse(String),

    #[error("no analysis data returned for {0}")]
    NoData(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Misconfiguration detected before any cycle starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("at least one symbol must be configured")]
    NoSymbols,

    #[error("at least one interval must be configured")]
    NoIntervals,

    #[error("symbol {0} is configured more than once")]
    DuplicateSymbol(Symbol),

    #[error("interval {0} is configured more than once")]
    DuplicateInterval(Interval),

    #[error("cycle period must be greater than zero")]
    ZeroPeriod,

    #[error("fetch timeout must be greater than zero")]
    ZeroTimeout,

    #[error("symbol {0} is not a row of the matrix")]
    UnknownRow(Symbol),

    #[error("scheduler is already running")]
    AlreadyStarted,

    #[error("failed to configure logger: {0}")]
    Logger(String),
}
