use std::collections::HashMap;

use crate::errors::ConfigError;
use crate::models::{Classification, Interval, RowResult, Symbol};

/// Latest aggregate for one row, as last applied to the matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowSummary {
    pub aggregate_score: i32,
    pub strong_count: i32,
    pub highlighted: bool,
}

/// The instrument x interval grid.
///
/// Row order and the column set are fixed at construction. Cells start
/// unclassified (`None`) and are overwritten row by row as results arrive.
/// Symbol and interval positions are resolved through slot maps built once
/// here, so applying a row never scans the key lists.
#[derive(Debug, Clone)]
pub struct Matrix {
    symbols: Vec<Symbol>,
    intervals: Vec<Interval>,
    row_slots: HashMap<Symbol, usize>,
    column_slots: HashMap<Interval, usize>,
    cells: Vec<Option<Classification>>,
    summaries: Vec<RowSummary>,
}

impl Matrix {
    pub fn new(symbols: Vec<Symbol>, intervals: Vec<Interval>) -> Result<Self, ConfigError> {
        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if intervals.is_empty() {
            return Err(ConfigError::NoIntervals);
        }

        let mut row_slots = HashMap::with_capacity(symbols.len());
        for (index, symbol) in symbols.iter().enumerate() {
            if row_slots.insert(symbol.clone(), index).is_some() {
                return Err(ConfigError::DuplicateSymbol(symbol.clone()));
            }
        }

        let mut column_slots = HashMap::with_capacity(intervals.len());
        for (index, interval) in intervals.iter().enumerate() {
            if column_slots.insert(*interval, index).is_some() {
                return Err(ConfigError::DuplicateInterval(*interval));
            }
        }

        let cells = vec![None; symbols.len() * intervals.len()];
        let summaries = vec![RowSummary::default(); symbols.len()];

        Ok(Matrix {
            symbols,
            intervals,
            row_slots,
            column_slots,
            cells,
            summaries,
        })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn row_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn column_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn row_index(&self, symbol: &Symbol) -> Option<usize> {
        self.row_slots.get(symbol).copied()
    }

    pub fn column_index(&self, interval: Interval) -> Option<usize> {
        self.column_slots.get(&interval).copied()
    }

    pub fn cell(&self, symbol: &Symbol, interval: Interval) -> Option<Classification> {
        let row = self.row_index(symbol)?;
        let column = self.column_index(interval)?;
        self.cells[row * self.intervals.len() + column]
    }

    pub fn row_summary(&self, symbol: &Symbol) -> Option<RowSummary> {
        self.row_index(symbol).map(|row| self.summaries[row])
    }

    /// Overwrites a row with the values of a freshly emitted result.
    /// Cells for intervals outside the column set are ignored.
    pub fn apply(&mut self, result: &RowResult) -> Result<usize, ConfigError> {
        let row = self
            .row_index(&result.symbol)
            .ok_or_else(|| ConfigError::UnknownRow(result.symbol.clone()))?;
        let width = self.intervals.len();

        for cell in &result.cells {
            match self.column_slots.get(&cell.interval) {
                Some(&column) => self.cells[row * width + column] = Some(cell.classification),
                None => log::debug!(
                    "[{}] Ignoring cell for unmapped interval {}",
                    result.symbol,
                    cell.interval
                ),
            }
        }

        self.summaries[row] = RowSummary {
            aggregate_score: result.aggregate_score,
            strong_count: result.strong_count,
            highlighted: result.highlighted,
        };
        Ok(row)
    }
}
