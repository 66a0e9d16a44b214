use serde::{Deserialize, Serialize};

use crate::models::Interval;
use crate::tradingview::helpers::recommend_column;

pub const SCANNER_URL: &str = "https://scanner.tradingview.com";

fn default_screener() -> String {
    "forex".to_string()
}

fn default_exchange() -> String {
    "FX_IDC".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradingViewSettings {
    #[serde(default = "default_screener")]
    pub screener: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

impl Default for TradingViewSettings {
    fn default() -> Self {
        TradingViewSettings {
            screener: default_screener(),
            exchange: default_exchange(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanRequest {
    pub symbols: ScanSymbols,
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanSymbols {
    pub tickers: Vec<String>,
    pub query: ScanQuery,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanQuery {
    pub types: Vec<String>,
}

impl ScanRequest {
    pub fn new(ticker: &str, interval: Interval) -> Self {
        ScanRequest {
            symbols: ScanSymbols {
                tickers: vec![ticker.to_string()],
                query: ScanQuery::default(),
            },
            columns: vec![recommend_column(interval)],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub data: Option<Vec<ScanRow>>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRow {
    #[serde(rename = "s")]
    pub ticker: String,
    #[serde(rename = "d")]
    pub values: Vec<Option<f64>>,
}
