use serde::{Deserialize, Serialize};
use std::fmt;

/// Recommendation returned by the analysis service for one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    StrongSell,
    Sell,
    #[default]
    Neutral,
    Buy,
    StrongBuy,
}

impl Classification {
    /// Maps a raw recommendation label. Anything outside the five known labels
    /// (including the service's own `ERROR`) is NEUTRAL.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "STRONG_SELL" => Classification::StrongSell,
            "SELL" => Classification::Sell,
            "NEUTRAL" => Classification::Neutral,
            "BUY" => Classification::Buy,
            "STRONG_BUY" => Classification::StrongBuy,
            _ => Classification::Neutral,
        }
    }

    pub fn delta(&self) -> i32 {
        match self {
            Classification::StrongSell => -2,
            Classification::Sell => -1,
            Classification::Neutral => 0,
            Classification::Buy => 1,
            Classification::StrongBuy => 2,
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Classification::StrongSell | Classification::StrongBuy)
    }

    // +1 for STRONG_BUY, -1 for STRONG_SELL, 0 otherwise
    pub fn strong_sign(&self) -> i32 {
        match self {
            Classification::StrongBuy => 1,
            Classification::StrongSell => -1,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::StrongSell => "STRONG_SELL",
            Classification::Sell => "SELL",
            Classification::Neutral => "NEUTRAL",
            Classification::Buy => "BUY",
            Classification::StrongBuy => "STRONG_BUY",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.label())
    }
}

pub fn classify(raw: &str) -> Classification {
    Classification::classify(raw)
}
