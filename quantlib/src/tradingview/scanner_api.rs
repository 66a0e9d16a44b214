use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::engine::FetchGateway;
use crate::errors::FetchError;
use crate::models::{Interval, Symbol};
use crate::tradingview::helpers::recommendation_from_value;
use crate::tradingview::objects::{ScanRequest, ScanResponse, TradingViewSettings, SCANNER_URL};

const USER_AGENT: &str = "quantlib-signal-matrix/0.1";

/// Looks up technical-analysis recommendations through the TradingView scanner.
pub struct TradingViewGateway {
    client: reqwest::Client,
    scan_url: String,
    exchange: String,
}

impl TradingViewGateway {
    pub fn new(settings: &TradingViewSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(TradingViewGateway {
            client,
            scan_url: format!("{}/{}/scan", SCANNER_URL, settings.screener),
            exchange: settings.exchange.clone(),
        })
    }

    pub fn ticker(&self, symbol: &Symbol) -> String {
        format!("{}:{}", self.exchange, symbol)
    }
}

#[async_trait]
impl FetchGateway for TradingViewGateway {
    async fn fetch(&self, symbol: &Symbol, interval: Interval) -> Result<String, FetchError> {
        let ticker = self.ticker(symbol);
        log::trace!("[{}][{}] Requesting analysis...", ticker, interval);

        let response = self
            .client
            .post(&self.scan_url)
            .json(&ScanRequest::new(&ticker, interval))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_recommendation(&body, &ticker)
    }
}

/// Extracts the recommendation label for `ticker` from a scanner response body.
pub fn parse_recommendation(body: &str, ticker: &str) -> Result<String, FetchError> {
    let response: ScanResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let value = response
        .data
        .unwrap_or_default()
        .into_iter()
        .find(|row| row.ticker == ticker)
        .and_then(|row| row.values.first().copied().flatten())
        .ok_or_else(|| FetchError::NoData(ticker.to_string()))?;

    Ok(recommendation_from_value(value).to_string())
}
