//! Application-level heartbeat for the realtime channel
//!
//! The server drops sessions that go quiet, so while a connection is up we
//! queue a ping at a fixed cadence. The monitor owns a single ticker task;
//! starting it again (for example after a reconnect) replaces the previous
//! task so at most one ticker is ever live.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::events::OutboundCommand;

/// Periodic ping scheduler tied to one connection epoch
pub struct HeartbeatMonitor {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Start ticking into `sink`
    ///
    /// The first ping fires one full interval after the call, not
    /// immediately. Any previously running ticker is stopped first.
    pub fn start(&mut self, sink: mpsc::UnboundedSender<OutboundCommand>) {
        self.stop();

        // Tokio intervals panic on a zero period
        let period = self.interval.max(Duration::from_millis(1));
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if sink.send(OutboundCommand::Ping).is_err() {
                    tracing::debug!("Heartbeat sink closed, stopping ticker");
                    break;
                }
                tracing::trace!("Heartbeat ping queued");
            }
        }));
    }

    /// Stop the ticker if one is running
    ///
    /// Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_ping_waits_one_full_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatMonitor::new(Duration::from_secs(30));
        heartbeat.start(tx);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(rx.recv().await, Some(OutboundCommand::Ping)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_repeat_every_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatMonitor::new(Duration::from_secs(30));
        heartbeat.start(tx);
        tokio::task::yield_now().await;

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(30)).await;
            assert!(matches!(rx.recv().await, Some(OutboundCommand::Ping)));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_pings_and_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatMonitor::new(Duration::from_secs(30));
        heartbeat.start(tx);
        tokio::task::yield_now().await;

        heartbeat.stop();
        heartbeat.stop();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_the_ticker() {
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatMonitor::new(Duration::from_secs(30));

        heartbeat.start(old_tx);
        tokio::task::yield_now().await;
        heartbeat.stop();
        heartbeat.start(new_tx);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(new_rx.recv().await, Some(OutboundCommand::Ping)));
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_exits_when_sink_is_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatMonitor::new(Duration::from_secs(30));
        heartbeat.start(tx);
        tokio::task::yield_now().await;

        drop(rx);
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert!(!heartbeat.is_running());
    }
}
