use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::LoopEvent;

const AUTO_CLEAR_AFTER: Duration = Duration::from_secs(3);
const FORCED_CLEAR_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl NoticeLevel {
    /// Whether the short timer clears this notice. Warnings and errors stay
    /// until the forced clear.
    pub fn auto_clears(self) -> bool {
        matches!(self, Self::Info | Self::Success)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub generation: u64,
}

/// Owns the two clear timers of the latest notice.
pub struct NoticeTimers {
    tx: UnboundedSender<LoopEvent>,
    auto_after: Duration,
    forced_after: Duration,
    auto: Option<JoinHandle<()>>,
    forced: Option<JoinHandle<()>>,
}

impl NoticeTimers {
    pub fn new(tx: UnboundedSender<LoopEvent>) -> Self {
        Self::with_delays(tx, AUTO_CLEAR_AFTER, FORCED_CLEAR_AFTER)
    }

    pub fn with_delays(
        tx: UnboundedSender<LoopEvent>,
        auto_after: Duration,
        forced_after: Duration,
    ) -> Self {
        Self {
            tx,
            auto_after,
            forced_after,
            auto: None,
            forced: None,
        }
    }

    /// Cancels the timers of the previous notice and arms fresh ones.
    pub fn schedule(&mut self, generation: u64) {
        self.cancel();
        self.auto = Some(spawn_expiry(
            self.tx.clone(),
            self.auto_after,
            generation,
            false,
        ));
        self.forced = Some(spawn_expiry(
            self.tx.clone(),
            self.forced_after,
            generation,
            true,
        ));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.auto.take() {
            handle.abort();
        }
        if let Some(handle) = self.forced.take() {
            handle.abort();
        }
    }
}

impl Drop for NoticeTimers {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_expiry(
    tx: UnboundedSender<LoopEvent>,
    after: Duration,
    generation: u64,
    forced: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(after).await;
        let _ = tx.send(LoopEvent::NoticeExpired { generation, forced });
    })
}
