//! Periodic timers feeding the task queue.

use tokio::sync::broadcast;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::config::TaskIntervals;
use crate::queue::TaskQueue;
use crate::tasks::TaskKind;

pub struct Scheduler {
    queue: TaskQueue,
    intervals: TaskIntervals,
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl Scheduler {
    pub const fn new(queue: TaskQueue, intervals: TaskIntervals) -> Self {
        Self { queue, intervals }
    }

    /// Push each reconciliation task on its own period until shutdown.
    ///
    /// Every timer fires once right away.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut detect_outdated = ticker(self.intervals.detect_outdated);
        let mut detect_conflict = ticker(self.intervals.detect_conflict);
        let mut sync_outdated = ticker(self.intervals.sync_outdated);

        tracing::info!(
            detect_outdated_secs = self.intervals.detect_outdated.as_secs(),
            detect_conflict_secs = self.intervals.detect_conflict.as_secs(),
            sync_outdated_secs = self.intervals.sync_outdated.as_secs(),
            "Scheduler started"
        );

        loop {
            let kind = tokio::select! {
                _ = shutdown.recv() => break,
                _ = detect_outdated.tick() => TaskKind::DetectOutdated,
                _ = detect_conflict.tick() => TaskKind::DetectConflict,
                _ = sync_outdated.tick() => TaskKind::SyncOutdated,
            };
            self.queue.push(kind);
        }

        tracing::info!("Scheduler stopped");
    }
}
