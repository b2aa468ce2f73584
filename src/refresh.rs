use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::LoopEvent;

/// Longest period the ticker runs with; larger intervals are clamped to it.
const MAX_PERIOD_SECS: u64 = 86_400;

/// Background ticker that asks the UI loop for a reload of the current view.
/// It only enqueues ticks; whether a tick rebuilds anything is decided by the
/// engine on the UI task.
pub struct RefreshScheduler {
    period: Duration,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Returns `None` when auto-refresh is disabled (`interval_secs <= 0`).
    pub fn start(interval_secs: i64, tx: UnboundedSender<LoopEvent>) -> Option<Self> {
        if interval_secs <= 0 {
            debug!("auto refresh disabled");
            return None;
        }

        let requested = u64::try_from(interval_secs).unwrap_or(MAX_PERIOD_SECS);
        if requested > MAX_PERIOD_SECS {
            debug!(requested, "refresh interval clamped to one day");
        }
        let period = Duration::from_secs(requested.min(MAX_PERIOD_SECS));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(LoopEvent::RefreshTick).is_err() {
                    break;
                }
            }
        });

        Some(Self { period, handle })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::RefreshScheduler;
    use crate::LoopEvent;
    use tokio::sync::mpsc;
    use tokio::time::{Duration, Instant};

    #[tokio::test(start_paused = true)]
    async fn non_positive_interval_starts_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(RefreshScheduler::start(0, tx.clone()).is_none());
        assert!(RefreshScheduler::start(-5, tx).is_none());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = RefreshScheduler::start(5, tx).expect("scheduler");
        assert_eq!(scheduler.period(), Duration::from_secs(5));
        let started = Instant::now();

        assert!(matches!(rx.recv().await, Some(LoopEvent::RefreshTick)));
        let first = started.elapsed();
        assert!(first >= Duration::from_secs(5) && first < Duration::from_secs(6));
        assert!(matches!(rx.recv().await, Some(LoopEvent::RefreshTick)));
        let second = started.elapsed();
        assert!(second >= Duration::from_secs(10) && second < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_interval_is_clamped_to_a_day() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = RefreshScheduler::start(i64::MAX, tx).expect("scheduler");
        assert_eq!(scheduler.period(), Duration::from_secs(86_400));
        let started = Instant::now();
        assert!(matches!(rx.recv().await, Some(LoopEvent::RefreshTick)));
        assert!(started.elapsed() >= Duration::from_secs(86_400));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = RefreshScheduler::start(1, tx).expect("scheduler");
        drop(scheduler);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
