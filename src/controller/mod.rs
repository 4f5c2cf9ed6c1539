//! Controller module - Operations viewers can trigger and the broadcast loop
//!
//! - `queue_view`: paginated queue reads and queue mutations
//! - `control_panel`: playback mode toggles
//! - `broadcaster`: periodic queue/state sampling
//! - `pubsub`: topic fan-out to viewers

mod queue_view;
mod control_panel;
mod broadcaster;
mod pubsub;

use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncError;
use crate::model::{DaemonClient, ExclusionStore};

pub use queue_view::{QueueView, MAX_PAGE_ATTEMPTS};
pub use control_panel::{ControlPanel, CROSSFADE_SECONDS};
pub use broadcaster::{BroadcasterHandle, StateBroadcaster, TickOutcome, DEFAULT_PERIOD};
pub use pubsub::{BroadcastHub, Envelope, Publisher, Topic, TOPIC_CAPACITY};

/// Everything a viewer talks to, built once around the single daemon session
#[derive(Clone)]
pub struct AppController {
    pub daemon: Arc<dyn DaemonClient>,
    pub queue: QueueView,
    pub control_panel: ControlPanel,
    pub exclusions: ExclusionStore,
    pub hub: Arc<BroadcastHub>,
}

impl AppController {
    pub fn new(
        daemon: Arc<dyn DaemonClient>,
        exclusions: ExclusionStore,
        reset_modes_on_clear: bool,
    ) -> Self {
        Self {
            queue: QueueView::new(daemon.clone()).with_reset_modes_on_clear(reset_modes_on_clear),
            control_panel: ControlPanel::new(daemon.clone()),
            daemon,
            exclusions,
            hub: Arc::new(BroadcastHub::new()),
        }
    }

    pub fn start_broadcaster(&self, period: Duration) -> BroadcasterHandle {
        StateBroadcaster::new(self.daemon.clone(), self.hub.clone())
            .with_period(period)
            .spawn()
    }

    /// Short explanation of an error for people at a terminal.
    pub fn format_error(error: &SyncError) -> String {
        match error {
            SyncError::Unreachable => {
                "MPD is not reachable. Check that it is running and the host/port settings.".to_string()
            }
            SyncError::DaemonRejected { code: 2, message, .. } => {
                format!("MPD rejected the position ({}). The queue may have changed, refresh and retry.", message)
            }
            SyncError::DaemonRejected { code: 4, .. } => {
                "MPD denied the command. Check the configured password.".to_string()
            }
            SyncError::Timeout(command) => format!("MPD did not answer '{}' in time.", command),
            other => format!("Error: {}", other),
        }
    }
}
