use tokio::sync::mpsc;

use crate::models::RowResult;

/// Receives completed rows. Called once per row per cycle, possibly from
/// several tasks at once, so implementations must be internally synchronized
/// or funnel into a single consumer.
pub trait ResultSink: Send + Sync {
    fn on_row_result(&self, row: RowResult);
}

impl ResultSink for mpsc::UnboundedSender<RowResult> {
    fn on_row_result(&self, row: RowResult) {
        if let Err(err) = self.send(row) {
            log::warn!("Result channel closed, dropping row for {}", err.0.symbol);
        }
    }
}
