//! Cosmetic download progress.
//!
//! Direct saves give no aggregate completion signal, so the bar is driven by
//! a timer instead of by I/O: +10 every 200ms while a batch runs, capped at
//! 90, snapped to 100 when the batch finalizes, then hidden and reset after
//! a short settle delay.
//!
//! ```text
//!  Hidden ──start()──▶ Running ──complete()/abandon()──▶ Settling ──500ms──▶ Hidden
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const TICK: Duration = Duration::from_millis(200);
pub const STEP: u8 = 10;
/// Highest value the ticker alone can reach.
pub const CAP: u8 = 90;
pub const SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressState {
    #[default]
    Hidden,
    Running,
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub state: ProgressState,
    pub percent: u8,
}

impl ProgressSnapshot {
    pub fn visible(&self) -> bool {
        self.state != ProgressState::Hidden
    }
}

pub struct ProgressReporter {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.tx.borrow()
    }

    /// Show the bar at 0 and start ticking. The returned handle owns the
    /// ticker; dropping it cancels the ticker on any exit path.
    pub fn start(&self) -> ProgressRun {
        self.tx.send_replace(ProgressSnapshot {
            state: ProgressState::Running,
            percent: 0,
        });

        let tx = Arc::clone(&self.tx);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tx.send_if_modified(|p| {
                    if p.state != ProgressState::Running || p.percent >= CAP {
                        return false;
                    }
                    p.percent = p.percent.saturating_add(STEP).min(CAP);
                    true
                });
            }
        });

        ProgressRun {
            tx: Arc::clone(&self.tx),
            ticker: Some(ticker),
            settled: false,
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// One running batch's share of the reporter.
pub struct ProgressRun {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
    ticker: Option<JoinHandle<()>>,
    settled: bool,
}

impl ProgressRun {
    /// Batch finalized: stop ticking, jump to 100, hide after [`SETTLE`].
    pub fn complete(mut self) {
        self.cancel_ticker();
        self.tx.send_replace(ProgressSnapshot {
            state: ProgressState::Settling,
            percent: 100,
        });
        self.schedule_reset();
    }

    /// Batch failed: stop ticking where it is, hide after [`SETTLE`].
    pub fn abandon(mut self) {
        self.cancel_ticker();
        self.tx.send_modify(|p| p.state = ProgressState::Settling);
        self.schedule_reset();
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn schedule_reset(&mut self) {
        self.settled = true;
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE).await;
            // A newer batch may have started meanwhile
            tx.send_if_modified(|p| {
                if p.state != ProgressState::Settling {
                    return false;
                }
                *p = ProgressSnapshot::default();
                true
            });
        });
    }
}

impl Drop for ProgressRun {
    fn drop(&mut self) {
        self.cancel_ticker();
        if !self.settled {
            self.tx.send_replace(ProgressSnapshot::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_by_ten_and_caps_at_ninety() {
        let reporter = ProgressReporter::new();
        let run = reporter.start();
        assert_eq!(reporter.snapshot().percent, 0);
        assert!(reporter.snapshot().visible());

        let mut last = 0;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let now = reporter.snapshot().percent;
            assert!(now >= last, "progress went backwards: {} -> {}", last, now);
            assert!(now <= CAP);
            last = now;
        }
        assert_eq!(last, CAP);
        drop(run);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_lands_after_one_period() {
        let reporter = ProgressReporter::new();
        let _run = reporter.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(reporter.snapshot().percent, 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(reporter.snapshot().percent, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_snaps_to_hundred_then_resets() {
        let reporter = ProgressReporter::new();
        let run = reporter.start();
        tokio::time::sleep(Duration::from_millis(450)).await;

        run.complete();
        assert_eq!(reporter.snapshot().percent, 100);

        // Ticker is gone, value stays put until the settle delay
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(reporter.snapshot().percent, 100);
        assert!(reporter.snapshot().visible());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reporter.snapshot(), ProgressSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_keeps_value_until_reset() {
        let reporter = ProgressReporter::new();
        let run = reporter.start();
        tokio::time::sleep(Duration::from_millis(650)).await;
        run.abandon();
        assert_eq!(reporter.snapshot().percent, 30);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!reporter.snapshot().visible());
        assert_eq!(reporter.snapshot().percent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_run_cancels_the_ticker() {
        let reporter = ProgressReporter::new();
        drop(reporter.start());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(reporter.snapshot(), ProgressSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reset_does_not_hide_a_new_run() {
        let reporter = ProgressReporter::new();
        reporter.start().complete();
        let _second = reporter.start();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(reporter.snapshot().state, ProgressState::Running);
    }
}
