use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::engine::{FetchGateway, ResultSink};
use crate::errors::{ConfigError, FetchError};
use crate::models::{
    Cell, Classification, HighlightThresholds, Interval, Matrix, RowAggregator, RowResult, Symbol,
};

/// Rows of one cycle, in completion order.
pub type CycleStream = BoxStream<'static, RowResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub fetch_timeout: Duration,
    // None derives the thresholds from the column count of each cycle
    pub thresholds: Option<HighlightThresholds>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            fetch_timeout: Duration::from_millis(8_000),
            thresholds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub rows: usize,
    pub emitted: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct RefreshOrchestrator {
    gateway: Arc<dyn FetchGateway>,
    config: OrchestratorConfig,
}

impl RefreshOrchestrator {
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        if config.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(RefreshOrchestrator { gateway, config })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn aggregator_for(&self, columns: usize) -> RowAggregator {
        match self.config.thresholds {
            Some(thresholds) => RowAggregator::new(thresholds),
            None => RowAggregator::for_columns(columns),
        }
    }

    /// Starts a refresh cycle over a snapshot of the matrix axes.
    ///
    /// Nothing is fetched until the stream is first polled. Each row then runs
    /// as its own task, fetching all of its columns concurrently, and is yielded
    /// as soon as its last column resolves. Once `cancel` fires the stream ends
    /// and rows still in flight are abandoned; dropping the stream aborts them.
    pub fn run_cycle(&self, matrix: &Matrix, cancel: CancellationToken) -> CycleStream {
        let symbols = matrix.symbols().to_vec();
        let intervals: Arc<[Interval]> = matrix.intervals().into();
        let aggregator = self.aggregator_for(intervals.len());
        let gateway = Arc::clone(&self.gateway);
        let fetch_timeout = self.config.fetch_timeout;
        let row_cancel = cancel.clone();

        let spawn_rows = async move {
            let mut rows = JoinSet::new();
            for symbol in symbols {
                rows.spawn(refresh_row(
                    Arc::clone(&gateway),
                    symbol,
                    Arc::clone(&intervals),
                    aggregator,
                    fetch_timeout,
                    row_cancel.clone(),
                ));
            }
            rows
        };

        stream::once(spawn_rows)
            .flat_map(|rows| stream::unfold(rows, next_completed_row))
            .take_until(cancel.cancelled_owned())
            .boxed()
    }

    /// Runs one cycle to completion (or cancellation), handing every row to `sink`.
    pub async fn drive_cycle(
        &self,
        matrix: &Matrix,
        sink: &dyn ResultSink,
        cancel: CancellationToken,
    ) -> CycleOutcome {
        let rows = self.run_cycle(matrix, cancel.clone());
        drain_into(rows, matrix.row_count(), sink, &cancel).await
    }
}

pub async fn drain_into(
    mut rows: CycleStream,
    expected_rows: usize,
    sink: &dyn ResultSink,
    cancel: &CancellationToken,
) -> CycleOutcome {
    let started = Instant::now();
    let mut emitted = 0;
    while let Some(row) = rows.next().await {
        log::trace!("[{}] Row complete, score {}", row.symbol, row.aggregate_score);
        sink.on_row_result(row);
        emitted += 1;
    }
    drop(rows);

    CycleOutcome {
        rows: expected_rows,
        emitted,
        cancelled: cancel.is_cancelled() && emitted < expected_rows,
        elapsed: started.elapsed(),
    }
}

type RowTasks = JoinSet<Option<RowResult>>;

async fn next_completed_row(mut rows: RowTasks) -> Option<(RowResult, RowTasks)> {
    while let Some(joined) = rows.join_next().await {
        match joined {
            Ok(Some(row)) => return Some((row, rows)),
            Ok(None) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => log::error!("Row task failed: {}", err),
        }
    }
    None
}

async fn refresh_row(
    gateway: Arc<dyn FetchGateway>,
    symbol: Symbol,
    intervals: Arc<[Interval]>,
    aggregator: RowAggregator,
    fetch_timeout: Duration,
    cancel: CancellationToken,
) -> Option<RowResult> {
    let fetches = intervals
        .iter()
        .map(|interval| fetch_cell(gateway.as_ref(), &symbol, *interval, fetch_timeout));

    let cells = tokio::select! {
        _ = cancel.cancelled() => {
            log::debug!("[{}] Row cancelled before completion", symbol);
            return None;
        }
        cells = join_all(fetches) => cells,
    };

    Some(aggregator.aggregate(symbol, cells, Utc::now()))
}

async fn fetch_cell(
    gateway: &dyn FetchGateway,
    symbol: &Symbol,
    interval: Interval,
    fetch_timeout: Duration,
) -> Cell {
    let fetched = timeout(fetch_timeout, gateway.fetch(symbol, interval))
        .await
        .unwrap_or(Err(FetchError::Timeout(fetch_timeout)));

    match fetched {
        Ok(raw) => Cell::fetched(symbol.clone(), interval, Classification::classify(&raw)),
        Err(err) => {
            log::warn!("[{}][{}] Fetch failed, using NEUTRAL: {}", symbol, interval, err);
            Cell::failed(symbol.clone(), interval)
        }
    }
}
