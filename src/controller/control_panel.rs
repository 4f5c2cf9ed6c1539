//! Playback mode toggles

use std::sync::Arc;

use crate::error::Result;
use crate::model::{DaemonClient, ModesPanel, PlaybackModes};

/// Crossfade applied when a viewer switches crossfade on
pub const CROSSFADE_SECONDS: u32 = 1;

#[derive(Clone)]
pub struct ControlPanel {
    daemon: Arc<dyn DaemonClient>,
}

impl ControlPanel {
    pub fn new(daemon: Arc<dyn DaemonClient>) -> Self {
        Self { daemon }
    }

    /// Set every mode flag from a viewer's panel.
    pub async fn apply(&self, panel: &ModesPanel) -> Result<()> {
        let modes = PlaybackModes {
            random: panel.random,
            repeat: panel.repeat,
            single: panel.single,
            consume: panel.consume,
            crossfade: if panel.crossfade { CROSSFADE_SECONDS } else { 0 },
        };
        tracing::info!(?panel, "Applying playback modes");
        apply_modes(self.daemon.as_ref(), &modes).await
    }

    pub async fn current(&self) -> Result<ModesPanel> {
        let status = self.daemon.status().await?;
        Ok(ModesPanel::from(&status.modes))
    }
}

pub(crate) async fn apply_modes(daemon: &dyn DaemonClient, modes: &PlaybackModes) -> Result<()> {
    daemon.set_random(modes.random).await?;
    daemon.set_repeat(modes.repeat).await?;
    daemon.set_crossfade(modes.crossfade).await?;
    daemon.set_consume(modes.consume).await?;
    daemon.set_single(modes.single).await?;
    Ok(())
}
