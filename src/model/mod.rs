//! Model module - Daemon state types and the resources shared across the app
//!
//! - `types`: queue entries, pages, playback snapshots
//! - `daemon`: the contract every daemon connection fulfils
//! - `mpd_client`: MPD implementation of that contract
//! - `exclusion`: persisted cover exclusion list

mod types;
mod daemon;
mod mpd_client;
mod exclusion;
#[cfg(test)]
pub(crate) mod memory;

pub use types::{
    AlbumRef, DaemonStatus, ModesPanel, Page, PlaybackModes, PlaybackState, PlayerState,
    QueueEntry,
};

pub use daemon::DaemonClient;

pub use mpd_client::{MpdClient, MpdSettings, DEFAULT_STATUS_EXPIRY};

pub use exclusion::{ExclusionStore, EXCLUSION_FILE_NAME};
