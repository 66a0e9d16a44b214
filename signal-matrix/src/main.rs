use quantlib::engine::{CycleScheduler, RefreshOrchestrator, ResultSink};
use quantlib::logging;
use quantlib::models::RowResult;
use quantlib::tradingview::TradingViewGateway;
use quantlib::util::{self, Settings};

use std::env;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

// One line per row: symbol, cells in column order, score, strong count, '*' when highlighted
fn render_row(row: &RowResult) -> String {
    let cells: Vec<String> = row
        .cells
        .iter()
        .map(|cell| {
            let marker = if cell.fetched { "" } else { "?" };
            format!("{}:{}{}", cell.interval, cell.classification, marker)
        })
        .collect();

    format!(
        "{:<8} | {} | score {:+3} | strong {:+2}{}",
        row.symbol,
        cells.join(" "),
        row.aggregate_score,
        row.strong_count,
        if row.highlighted { " *" } else { "" }
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let settings_path = args.get(1).map(String::as_str);

    let settings = match settings_path {
        Some(path) => Settings::load(path),
        None => util::read_settings(),
    };
    let settings = settings.unwrap_or_else(|err| {
        let path = settings_path.unwrap_or(util::SETTINGS_FILE);
        eprintln!("Failed to read settings from {}: {}", path, err);
        std::process::exit(1);
    });

    // Configure logger
    logging::configure_logger(&settings.log_path, &settings.log_level)?;
    settings.validate()?;

    let matrix = Arc::new(RwLock::new(settings.matrix()?));
    log::info!(
        "Watching {} symbols across {} intervals on {}:{}",
        settings.symbols.len(),
        settings.intervals.len(),
        settings.tradingview.screener,
        settings.tradingview.exchange
    );

    let gateway = Arc::new(TradingViewGateway::new(&settings.tradingview)?);
    let orchestrator = Arc::new(RefreshOrchestrator::new(gateway, settings.orchestrator_config())?);

    let (row_tx, mut row_rx) = mpsc::unbounded_channel::<RowResult>();
    let sink: Arc<dyn ResultSink> = Arc::new(row_tx);

    let mut scheduler = CycleScheduler::new(settings.scheduler_config())?;
    scheduler.start(orchestrator, Arc::clone(&matrix), sink)?;

    // Handle SIGINT
    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                log::info!("Received SIGINT, cancelling refresh and exiting...");
                break;
            }
            row = row_rx.recv() => match row {
                Some(row) => {
                    if let Err(err) = matrix.write().await.apply(&row) {
                        log::error!("{}", err);
                        continue;
                    }
                    log::info!("{}", render_row(&row));
                }
                None => break,
            }
        }
    }

    scheduler.stop().await;
    let stats = scheduler.stats();
    log::info!(
        "{} cycles started, {} completed, {} cancelled, {} timer fires skipped",
        stats.cycles_started,
        stats.cycles_completed,
        stats.cycles_cancelled,
        stats.fires_skipped
    );

    Ok(())
}
