use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::client::services::api::MatchApi;
use crate::client::services::timeline_service::TimelineService;

/// Background refresher for an open conversation.
pub struct Poller;

/// Control handle of a running poller. Dropping it stops the poller once
/// the refresh in progress (if any) has finished.
pub struct PollHandle {
    trigger: Arc<Notify>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Refresh `service` every `interval` (never when `None`) and whenever
    /// [`PollHandle::request_refresh`] is called. Requests arriving while a
    /// refresh runs, or before the poller gets to run, collapse into one.
    pub fn spawn<A: MatchApi>(service: TimelineService<A>, interval: Option<Duration>) -> PollHandle {
        let trigger = Arc::new(Notify::new());
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let wake = Arc::clone(&trigger);

        let task = tokio::spawn(async move {
            let mut ticker = interval.map(|period| {
                let mut ticker = time::interval_at(time::Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = wake.notified() => debug!("[POLL] refresh requested"),
                    _ = next_tick(&mut ticker) => debug!("[POLL] tick"),
                }
                if let Err(e) = service.refresh().await {
                    warn!("[POLL] refresh failed: {:#}", e);
                }
            }
            debug!("[POLL] stopped");
        });

        PollHandle { trigger, shutdown, task }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl PollHandle {
    pub fn request_refresh(&self) {
        self.trigger.notify_one();
    }

    /// Stop polling and wait for the task to wind down.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!("[POLL] poller task ended abnormally: {}", e);
        }
    }
}
