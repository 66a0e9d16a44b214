use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::{drain_into, RefreshOrchestrator, ResultSink};
use crate::errors::ConfigError;
use crate::models::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub period: Duration,
    // Fire the first cycle at start instead of one period later
    pub run_immediately: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            period: Duration::from_millis(10_000),
            run_immediately: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_cancelled: u64,
    pub fires_skipped: u64,
}

#[derive(Default)]
struct Shared {
    running: AtomicBool,
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_cancelled: AtomicU64,
    fires_skipped: AtomicU64,
    current_cycle: Mutex<Option<CancellationToken>>,
}

impl Shared {
    fn set_current_cycle(&self, token: Option<CancellationToken>) {
        if let Ok(mut current) = self.current_cycle.lock() {
            *current = token;
        }
    }
}

// Returns the scheduler to Idle when a cycle task ends, including by unwinding out of a sink
struct CycleGuard(Arc<Shared>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.set_current_cycle(None);
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Fires refresh cycles on a fixed period.
///
/// At most one cycle is in flight at a time: a timer fire that lands while a
/// cycle is still running is dropped and counted in `fires_skipped`, never
/// queued. Stopping (or dropping) the scheduler cancels the in-flight cycle.
/// A cycle that panics, for instance in its sink, is logged and the timer
/// carries on.
pub struct CycleScheduler {
    config: SchedulerConfig,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl CycleScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        if config.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(CycleScheduler {
            config,
            shared: Arc::new(Shared::default()),
            shutdown: CancellationToken::new(),
            timer: None,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn start(
        &mut self,
        orchestrator: Arc<RefreshOrchestrator>,
        matrix: Arc<RwLock<Matrix>>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<(), ConfigError> {
        if self.timer.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }

        log::info!(
            "Starting refresh scheduler, period {:?}{}",
            self.config.period,
            if self.config.run_immediately { ", first cycle now" } else { "" }
        );
        self.shutdown = CancellationToken::new();
        self.timer = Some(tokio::spawn(run_timer(
            self.config,
            Arc::clone(&self.shared),
            self.shutdown.clone(),
            orchestrator,
            matrix,
            sink,
        )));
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.timer.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        if self.shared.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles_started: self.shared.cycles_started.load(Ordering::SeqCst),
            cycles_completed: self.shared.cycles_completed.load(Ordering::SeqCst),
            cycles_cancelled: self.shared.cycles_cancelled.load(Ordering::SeqCst),
            fires_skipped: self.shared.fires_skipped.load(Ordering::SeqCst),
        }
    }

    /// Cancels the cycle in flight, if any. The timer keeps running.
    pub fn cancel_cycle(&self) -> bool {
        match self.shared.current_cycle.lock() {
            Ok(current) => match current.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Stops the timer, cancels the cycle in flight and waits for both to wind down.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(timer) = self.timer.take() {
            if let Err(err) = timer.await {
                log::error!("Refresh scheduler task failed: {}", err);
            }
        }
        log::info!("Refresh scheduler stopped");
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_timer(
    config: SchedulerConfig,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    orchestrator: Arc<RefreshOrchestrator>,
    matrix: Arc<RwLock<Matrix>>,
    sink: Arc<dyn ResultSink>,
) {
    let first_fire = if config.run_immediately {
        Instant::now()
    } else {
        Instant::now() + config.period
    };
    let mut ticker = interval_at(first_fire, config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycle: Option<JoinHandle<()>> = None;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Surface a panicked cycle here rather than only at shutdown
        if let Some(previous) = cycle.take() {
            if previous.is_finished() {
                if let Err(err) = previous.await {
                    log::error!("Refresh cycle task failed: {}", err);
                }
            } else {
                cycle = Some(previous);
            }
        }

        if shared.running.swap(true, Ordering::SeqCst) {
            let skipped = shared.fires_skipped.fetch_add(1, Ordering::SeqCst) + 1;
            log::warn!(
                "Previous refresh cycle still running, skipping this one ({} skipped so far)",
                skipped
            );
            continue;
        }

        let token = shutdown.child_token();
        shared.set_current_cycle(Some(token.clone()));
        cycle = Some(tokio::spawn(run_one_cycle(
            Arc::clone(&shared),
            Arc::clone(&orchestrator),
            Arc::clone(&matrix),
            Arc::clone(&sink),
            token,
        )));
    }

    if let Some(cycle) = cycle {
        if let Err(err) = cycle.await {
            log::error!("Refresh cycle task failed: {}", err);
        }
    }
}

async fn run_one_cycle(
    shared: Arc<Shared>,
    orchestrator: Arc<RefreshOrchestrator>,
    matrix: Arc<RwLock<Matrix>>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
) {
    let _guard = CycleGuard(Arc::clone(&shared));
    let number = shared.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;

    // Only the snapshot is taken under the lock, so the consumer can keep applying rows
    let (rows, expected_rows) = {
        let matrix = matrix.read().await;
        (orchestrator.run_cycle(&matrix, cancel.clone()), matrix.row_count())
    };
    log::info!("Starting refresh cycle {} over {} rows", number, expected_rows);

    let outcome = drain_into(rows, expected_rows, sink.as_ref(), &cancel).await;
    if outcome.cancelled {
        shared.cycles_cancelled.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "Refresh cycle {} cancelled after {:?}, {} of {} rows emitted",
            number,
            outcome.elapsed,
            outcome.emitted,
            outcome.rows
        );
    } else {
        shared.cycles_completed.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "Refresh cycle {} finished in {:?}, {} rows emitted",
            number,
            outcome.elapsed,
            outcome.emitted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{CollectingSink, Reply, ScriptedGateway};
    use crate::engine::OrchestratorConfig;
    use crate::models::{Interval, RowResult, Symbol};

    const SECOND: Duration = Duration::from_secs(1);

    // Panics on the first row it receives, then collects
    #[derive(Default)]
    struct PanicOnceSink {
        panicked: AtomicBool,
        rows: CollectingSink,
    }

    impl ResultSink for PanicOnceSink {
        fn on_row_result(&self, row: RowResult) {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("display consumer failed on {}", row.symbol);
            }
            self.rows.on_row_result(row);
        }
    }

    struct Harness {
        gateway: Arc<ScriptedGateway>,
        sink: Arc<CollectingSink>,
        scheduler: CycleScheduler,
    }

    fn harness(
        gateway: ScriptedGateway,
        symbols: &[&str],
        intervals: &[Interval],
        config: SchedulerConfig,
    ) -> Harness {
        let gateway = Arc::new(gateway);
        let orchestrator = RefreshOrchestrator::new(
            Arc::clone(&gateway) as Arc<dyn crate::engine::FetchGateway>,
            OrchestratorConfig {
                fetch_timeout: 60 * SECOND,
                thresholds: None,
            },
        )
        .unwrap();
        let symbols = symbols.iter().map(|s| Symbol::from(*s)).collect();
        let matrix = Matrix::new(symbols, intervals.to_vec()).unwrap();
        let sink = Arc::new(CollectingSink::default());
        let mut scheduler = CycleScheduler::new(config).unwrap();
        scheduler
            .start(
                Arc::new(orchestrator),
                Arc::new(RwLock::new(matrix)),
                Arc::clone(&sink) as Arc<dyn ResultSink>,
            )
            .unwrap();
        Harness { gateway, sink, scheduler }
    }

    #[test]
    fn rejects_zero_period() {
        let result = CycleScheduler::new(SchedulerConfig {
            period: Duration::ZERO,
            run_immediately: false,
        });
        assert!(matches!(result, Err(ConfigError::ZeroPeriod)));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_every_period_after_a_full_period() {
        let mut h = harness(
            ScriptedGateway::new(SECOND, Reply::Label("BUY")),
            &["EURUSD", "USDJPY"],
            &[Interval::OneHour, Interval::OneDay],
            SchedulerConfig {
                period: 10 * SECOND,
                run_immediately: false,
            },
        );

        tokio::time::sleep(5 * SECOND).await;
        assert_eq!(h.scheduler.stats(), SchedulerStats::default());
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);

        tokio::time::sleep(20 * SECOND).await;
        let stats = h.scheduler.stats();
        assert_eq!(stats.cycles_started, 2);
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.fires_skipped, 0);
        assert_eq!(h.sink.rows().len(), 4);

        h.scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_fire_is_skipped() {
        let mut h = harness(
            ScriptedGateway::new(25 * SECOND, Reply::Label("STRONG_SELL")),
            &["EURUSD", "USDJPY"],
            &[Interval::OneHour, Interval::OneDay],
            SchedulerConfig {
                period: 10 * SECOND,
                run_immediately: false,
            },
        );

        // cycle starts at 10s, fires at 20s and 30s land while it runs, it ends at 35s
        tokio::time::sleep(36 * SECOND).await;
        assert_eq!(
            h.scheduler.stats(),
            SchedulerStats {
                cycles_started: 1,
                cycles_completed: 1,
                cycles_cancelled: 0,
                fires_skipped: 2,
            }
        );
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.sink.rows().len(), 2);
        assert!(h.gateway.max_in_flight() <= 4);

        tokio::time::sleep(5 * SECOND).await;
        assert_eq!(h.scheduler.stats().cycles_started, 2);
        assert_eq!(h.scheduler.state(), SchedulerState::Running);

        h.scheduler.stop().await;
        assert!(h.gateway.max_in_flight() <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_cycle_emits_nothing_more_and_returns_to_idle() {
        let gateway = ScriptedGateway::new(SECOND, Reply::Label("BUY"))
            .with("USDJPY", Interval::OneHour, 30 * SECOND, Reply::Label("BUY"));
        let mut h = harness(
            gateway,
            &["EURUSD", "USDJPY"],
            &[Interval::OneHour],
            SchedulerConfig {
                period: 100 * SECOND,
                run_immediately: true,
            },
        );

        tokio::time::sleep(5 * SECOND).await;
        assert_eq!(h.scheduler.state(), SchedulerState::Running);
        assert_eq!(h.sink.rows().len(), 1);

        assert!(h.scheduler.cancel_cycle());
        tokio::time::sleep(SECOND).await;

        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.gateway.in_flight(), 0);
        let stats = h.scheduler.stats();
        assert_eq!(stats.cycles_cancelled, 1);
        assert_eq!(stats.cycles_completed, 0);

        tokio::time::sleep(60 * SECOND).await;
        assert_eq!(h.sink.rows().len(), 1);
        assert!(!h.scheduler.cancel_cycle());

        h.scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_cycle_in_flight() {
        let mut h = harness(
            ScriptedGateway::new(30 * SECOND, Reply::Label("BUY")),
            &["EURUSD"],
            &[Interval::OneHour, Interval::OneDay],
            SchedulerConfig {
                period: 10 * SECOND,
                run_immediately: true,
            },
        );

        tokio::time::sleep(5 * SECOND).await;
        assert_eq!(h.gateway.in_flight(), 2);

        h.scheduler.stop().await;
        tokio::time::sleep(SECOND).await;

        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.gateway.in_flight(), 0);
        assert!(h.sink.rows().is_empty());
        assert_eq!(h.scheduler.stats().cycles_cancelled, 1);
        assert!(!h.scheduler.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_sink_does_not_wedge_the_timer() {
        let gateway = Arc::new(ScriptedGateway::new(SECOND, Reply::Label("BUY")));
        let orchestrator =
            RefreshOrchestrator::new(gateway, OrchestratorConfig::default()).unwrap();
        let matrix = Matrix::new(vec![Symbol::from("EURUSD")], vec![Interval::OneHour]).unwrap();
        let sink = Arc::new(PanicOnceSink::default());
        let mut scheduler = CycleScheduler::new(SchedulerConfig {
            period: 10 * SECOND,
            run_immediately: true,
        })
        .unwrap();
        scheduler
            .start(
                Arc::new(orchestrator),
                Arc::new(RwLock::new(matrix)),
                Arc::clone(&sink) as Arc<dyn ResultSink>,
            )
            .unwrap();

        // first cycle unwinds out of the sink at 1s
        tokio::time::sleep(5 * SECOND).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.cancel_cycle());

        // the 10s fire starts a fresh cycle instead of being skipped
        tokio::time::sleep(10 * SECOND).await;
        let stats = scheduler.stats();
        assert_eq!(stats.cycles_started, 2);
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.fires_skipped, 0);
        assert_eq!(sink.rows.rows().len(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_start_twice() {
        let mut h = harness(
            ScriptedGateway::new(SECOND, Reply::Label("BUY")),
            &["EURUSD"],
            &[Interval::OneHour],
            SchedulerConfig::default(),
        );
        let gateway = Arc::new(ScriptedGateway::new(SECOND, Reply::Label("BUY")));
        let orchestrator =
            RefreshOrchestrator::new(gateway, OrchestratorConfig::default()).unwrap();
        let matrix = Matrix::new(vec![Symbol::from("EURUSD")], vec![Interval::OneHour]).unwrap();
        let result = h.scheduler.start(
            Arc::new(orchestrator),
            Arc::new(RwLock::new(matrix)),
            Arc::clone(&h.sink) as Arc<dyn ResultSink>,
        );
        assert!(matches!(result, Err(ConfigError::AlreadyStarted)));

        h.scheduler.stop().await;
    }
}
