use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Classification, Interval, Symbol};

/// One classified (symbol, interval) result for a single cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub symbol: Symbol,
    pub interval: Interval,
    pub classification: Classification,
    // false when the fetch failed or timed out and the cell was downgraded to NEUTRAL
    pub fetched: bool,
}

impl Cell {
    pub fn fetched(symbol: Symbol, interval: Interval, classification: Classification) -> Self {
        Cell {
            symbol,
            interval,
            classification,
            fetched: true,
        }
    }

    pub fn failed(symbol: Symbol, interval: Interval) -> Self {
        Cell {
            symbol,
            interval,
            classification: Classification::Neutral,
            fetched: false,
        }
    }
}

/// A completed row, emitted once per row per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    pub symbol: Symbol,
    pub cells: Vec<Cell>, // in column order
    pub aggregate_score: i32,
    pub strong_count: i32,
    pub highlighted: bool,
    pub failed_cells: usize,
    pub refreshed_at: DateTime<Utc>,
}

impl RowResult {
    pub fn column_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, interval: Interval) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.interval == interval)
    }
}

/// Thresholds a row must meet (in absolute value) to be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightThresholds {
    pub score: u32,
    pub strong: u32,
}

impl HighlightThresholds {
    /// Score threshold equals the column count, strong threshold is ceil(0.625 * columns).
    /// With eight columns that gives 8 and 5.
    /// Column counts beyond `u32::MAX` saturate; no row can reach such a threshold anyway.
    pub fn for_columns(columns: usize) -> Self {
        let columns = u32::try_from(columns).unwrap_or(u32::MAX);
        let strong = (u64::from(columns) * 5 + 7) / 8;
        HighlightThresholds {
            score: columns,
            strong: u32::try_from(strong).unwrap_or(u32::MAX),
        }
    }

    pub fn is_met(&self, aggregate_score: i32, strong_count: i32) -> bool {
        aggregate_score.unsigned_abs() >= self.score && strong_count.unsigned_abs() >= self.strong
    }
}

/// Folds a row's cells into its score, strong count and highlight flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowAggregator {
    thresholds: HighlightThresholds,
}

impl RowAggregator {
    pub fn new(thresholds: HighlightThresholds) -> Self {
        RowAggregator { thresholds }
    }

    pub fn for_columns(columns: usize) -> Self {
        RowAggregator::new(HighlightThresholds::for_columns(columns))
    }

    pub fn thresholds(&self) -> HighlightThresholds {
        self.thresholds
    }

    /// Pure fold: the same cells and timestamp always give the same row.
    pub fn aggregate(
        &self,
        symbol: Symbol,
        cells: Vec<Cell>,
        refreshed_at: DateTime<Utc>,
    ) -> RowResult {
        let mut aggregate_score = 0;
        let mut strong_count = 0;
        let mut failed_cells = 0;

        for cell in &cells {
            aggregate_score += cell.classification.delta();
            strong_count += cell.classification.strong_sign();
            if !cell.fetched {
                failed_cells += 1;
            }
        }

        RowResult {
            symbol,
            cells,
            aggregate_score,
            strong_count,
            highlighted: self.thresholds.is_met(aggregate_score, strong_count),
            failed_cells,
            refreshed_at,
        }
    }
}

/// Aggregates with the default thresholds for the row's own column count.
pub fn aggregate(symbol: Symbol, cells: Vec<Cell>, refreshed_at: DateTime<Utc>) -> RowResult {
    RowAggregator::for_columns(cells.len()).aggregate(symbol, cells, refreshed_at)
}
