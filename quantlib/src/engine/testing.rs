use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{FetchGateway, ResultSink};
use crate::errors::FetchError;
use crate::models::{Interval, RowResult, Symbol};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Label(&'static str),
    Fail,
}

/// In-memory gateway answering from a per-cell script after a simulated delay.
pub(crate) struct ScriptedGateway {
    default: (Duration, Reply),
    script: HashMap<(Symbol, Interval), (Duration, Reply)>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedGateway {
    pub(crate) fn new(delay: Duration, reply: Reply) -> Self {
        ScriptedGateway {
            default: (delay, reply),
            script: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(
        mut self,
        symbol: &str,
        interval: Interval,
        delay: Duration,
        reply: Reply,
    ) -> Self {
        self.script.insert((Symbol::from(symbol), interval), (delay, reply));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchGateway for ScriptedGateway {
    async fn fetch(&self, symbol: &Symbol, interval: Interval) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (delay, reply) = self
            .script
            .get(&(symbol.clone(), interval))
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        tokio::time::sleep(delay).await;

        match reply {
            Reply::Label(label) => Ok(label.to_string()),
            Reply::Fail => Err(FetchError::Status(503)),
        }
    }
}

#[derive(Default)]
pub(crate) struct CollectingSink {
    rows: Mutex<Vec<RowResult>>,
}

impl CollectingSink {
    pub(crate) fn rows(&self) -> Vec<RowResult> {
        self.rows.lock().unwrap().clone()
    }
}

impl ResultSink for CollectingSink {
    fn on_row_result(&self, row: RowResult) {
        self.rows.lock().unwrap().push(row);
    }
}
