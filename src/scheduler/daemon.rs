use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

use crate::scheduler::{CycleContext, Poller};

/// 固定間隔のポーリングデーモンを起動する。
pub fn spawn_poll_daemon(poller: Poller, interval: Duration) -> JoinHandle<()> {
    PollDaemon::new(poller, interval).spawn()
}

struct PollDaemon {
    poller: Poller,
    interval: Duration,
}

impl PollDaemon {
    fn new(poller: Poller, interval: Duration) -> Self {
        Self { poller, interval }
    }

    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// 実行→待機を繰り返す。サイクルの失敗はログに残して続行する。
    async fn run(self) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "poll daemon started"
        );

        loop {
            let cycle = CycleContext::new();
            match self.poller.run_cycle(cycle).await {
                Ok(report) => info!(
                    cycle_id = %report.cycle_id,
                    published = report.published,
                    duplicates = report.duplicates,
                    "poll cycle completed"
                ),
                Err(err) => error!(cycle_id = %cycle.cycle_id, error = %err, "poll cycle failed"),
            }

            info!(
                wait_seconds = self.interval.as_secs(),
                "sleeping until next poll"
            );
            sleep(self.interval).await;
        }
    }
}
