//! Periodic sampling of the daemon, fanned out to every viewer
//!
//! Each stream (queue, state) runs as its own task with fixed-delay
//! scheduling: the next tick starts one period after the previous one
//! finished, so a slow daemon stretches the cadence instead of piling up
//! overlapping reads. The two streams are independent; a viewer may see a new
//! queue next to a state that is up to one period older.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::model::{DaemonClient, PlaybackState};
use super::pubsub::{Publisher, Topic};
use super::queue_view::QueueView;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// What a single tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Daemon unreachable, nothing read or published
    Idle,
    Published,
    /// A read failed; nothing was published this tick
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Idle,
    Publishing,
}

#[derive(Clone)]
pub struct StateBroadcaster {
    daemon: Arc<dyn DaemonClient>,
    queue_view: QueueView,
    publisher: Arc<dyn Publisher>,
    period: Duration,
}

impl StateBroadcaster {
    pub fn new(daemon: Arc<dyn DaemonClient>, publisher: Arc<dyn Publisher>) -> Self {
        let queue_view = QueueView::new(daemon.clone());
        Self {
            daemon,
            queue_view,
            publisher,
            period: DEFAULT_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sample the queue and publish it on the queue topic.
    pub async fn tick_queue(&self) -> TickOutcome {
        if !self.daemon.is_connected().await {
            return TickOutcome::Idle;
        }
        self.daemon.invalidate_cache().await;

        let outcome = self.queue_view.full_queue().await;
        self.finish(Topic::Queue, outcome)
    }

    /// Sample status and current track and publish them on the state topic.
    pub async fn tick_state(&self) -> TickOutcome {
        if !self.daemon.is_connected().await {
            return TickOutcome::Idle;
        }
        self.daemon.invalidate_cache().await;

        let outcome = self.sample_state().await;
        self.finish(Topic::State, outcome)
    }

    async fn sample_state(&self) -> Result<PlaybackState> {
        let status = self.daemon.status().await?;
        let current_track = self.daemon.current_track().await?;
        Ok(PlaybackState::new(status, current_track))
    }

    fn finish<T: Serialize>(&self, topic: Topic, outcome: Result<T>) -> TickOutcome {
        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(topic = topic.as_str(), error = %e, "Tick failed, nothing published");
                return TickOutcome::Failed;
            }
        };

        match serde_json::to_value(&snapshot) {
            Ok(payload) => {
                self.publisher.publish(topic, payload);
                TickOutcome::Published
            }
            Err(e) => {
                tracing::error!(topic = topic.as_str(), error = %e, "Snapshot could not be encoded");
                TickOutcome::Failed
            }
        }
    }

    async fn tick(&self, topic: Topic) -> TickOutcome {
        match topic {
            Topic::Queue => self.tick_queue().await,
            Topic::State => self.tick_state().await,
        }
    }

    /// Start one background task per topic. They run until the handle is shut down.
    pub fn spawn(self) -> BroadcasterHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tracing::info!(period_ms = self.period.as_millis() as u64, "Starting state broadcaster");

        let tasks = [Topic::Queue, Topic::State]
            .into_iter()
            .map(|topic| {
                let broadcaster = self.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move { broadcaster.run(topic, shutdown).await })
            })
            .collect();

        BroadcasterHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }

    async fn run(self, topic: Topic, mut shutdown: watch::Receiver<bool>) {
        let mut state = StreamState::Idle;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = match self.tick(topic).await {
                TickOutcome::Idle => StreamState::Idle,
                TickOutcome::Published => StreamState::Publishing,
                // A failed tick does not change the stream's state
                TickOutcome::Failed => state,
            };
            if next != state {
                tracing::info!(topic = topic.as_str(), from = ?state, to = ?next, "Broadcast stream changed state");
                state = next;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(topic = topic.as_str(), "Broadcast stream stopped");
    }
}

/// Stops the broadcaster tasks
pub struct BroadcasterHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BroadcasterHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Broadcaster task ended abnormally");
            }
        }
        tracing::info!("State broadcaster stopped");
    }
}
