use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::{Interval, Symbol};

/// Source of raw recommendation labels for one (symbol, interval) cell.
///
/// Implementations may take arbitrarily long; the orchestrator bounds every
/// call with its own timeout and downgrades any error to NEUTRAL.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    async fn fetch(&self, symbol: &Symbol, interval: Interval) -> Result<String, FetchError>;
}
