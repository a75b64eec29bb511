//! Progress reporting: one channel per counter, a single task owning the totals.

use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub read: u64,
    pub written: u64,
    pub skipped: u64,
}

/// Totals plus the counts accumulated since the previous tick.
#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    totals: Totals,
    read_per_tick: u64,
    written_per_tick: u64,
    skipped_per_tick: u64,
}

/// Producer side handed to batch workers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReporterHandle {
    read_tx: mpsc::Sender<u64>,
    written_tx: mpsc::Sender<u64>,
    skipped_tx: mpsc::Sender<u64>,
}

impl ReporterHandle {
    pub async fn read(&self, n: u64) { Self::send(&self.read_tx, n).await }
    pub async fn written(&self, n: u64) { Self::send(&self.written_tx, n).await }
    pub async fn skipped(&self, n: u64) { Self::send(&self.skipped_tx, n).await }

    async fn send(tx: &mpsc::Sender<u64>, n: u64) {
        if n == 0 { return; }
        // the reporter only stops once every handle is dropped
        let _ = tx.send(n).await;
    }
}

/// Consumer side: the task that owns the totals.
pub struct Reporter {
    task: JoinHandle<Totals>,
}

impl Reporter {
    /// Wait for every handle to drop, then return the final totals.
    pub async fn finish(self) -> Totals {
        match self.task.await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "reporter task lost; totals unavailable");
                Totals::default()
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    snap: Snapshot,
}

impl Counters {
    fn read(&mut self, n: u64) {
        self.snap.totals.read += n;
        self.snap.read_per_tick += n;
        counter!("bindex_records_read_total", n);
    }
    fn written(&mut self, n: u64) {
        self.snap.totals.written += n;
        self.snap.written_per_tick += n;
        counter!("bindex_records_written_total", n);
    }
    fn skipped(&mut self, n: u64) {
        self.snap.totals.skipped += n;
        self.snap.skipped_per_tick += n;
        counter!("bindex_records_skipped_total", n);
    }
    fn tick(&mut self) -> Snapshot {
        let out = self.snap;
        self.snap.read_per_tick = 0;
        self.snap.written_per_tick = 0;
        self.snap.skipped_per_tick = 0;
        out
    }
}

fn progress_line(s: &Snapshot) -> String {
    format!(
        "Read: {:>6}  Written: {:>6}  Skipped: {:>6}  |  rps: {:>6}  ips: {:>6}  sps: {:>6}",
        s.totals.read, s.totals.written, s.totals.skipped, s.read_per_tick, s.written_per_tick, s.skipped_per_tick
    )
}

/// Spawn the reporter. It logs a snapshot every `tick` and stops once all handles are dropped.
pub fn spawn_reporter(tick: Duration, cap: usize) -> (ReporterHandle, Reporter) {
    let cap = cap.max(1);
    let tick = tick.max(Duration::from_millis(1));
    let (read_tx, mut read_rx) = mpsc::channel::<u64>(cap);
    let (written_tx, mut written_rx) = mpsc::channel::<u64>(cap);
    let (skipped_tx, mut skipped_rx) = mpsc::channel::<u64>(cap);

    let task = tokio::spawn(async move {
        let mut counters = Counters::default();
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (mut read_open, mut written_open, mut skipped_open) = (true, true, true);
        while read_open || written_open || skipped_open {
            tokio::select! {
                maybe = read_rx.recv(), if read_open => match maybe {
                    Some(n) => counters.read(n),
                    None => read_open = false,
                },
                maybe = written_rx.recv(), if written_open => match maybe {
                    Some(n) => counters.written(n),
                    None => written_open = false,
                },
                maybe = skipped_rx.recv(), if skipped_open => match maybe {
                    Some(n) => counters.skipped(n),
                    None => skipped_open = false,
                },
                _ = ticker.tick() => info!("{}", progress_line(&counters.tick())),
            }
        }
        let last = counters.tick();
        info!(read = last.totals.read, written = last.totals.written, skipped = last.totals.skipped, "reporter stopped");
        last.totals
    });

    (ReporterHandle { read_tx, written_tx, skipped_tx }, Reporter { task })
}
