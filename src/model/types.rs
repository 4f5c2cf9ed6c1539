//! Core type definitions shared by the daemon client, the queue view and the broadcaster

use serde::{Deserialize, Serialize};

/// One element of the daemon's play queue.
///
/// Positions are dense (`0..len`) at the instant the entry was read; they are
/// not a stable identity across mutations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub position: usize,
    pub id: Option<u32>,
    pub file: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u32>,
}

impl QueueEntry {
    pub fn new(position: usize, file: impl Into<String>) -> Self {
        Self {
            position,
            id: None,
            file: file.into(),
            title: None,
            artist: None,
            album: None,
            duration_ms: None,
        }
    }
}

/// A window over the queue
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub index: usize,
    pub size: usize,
    pub total: usize,
    pub entries: Vec<QueueEntry>,
}

impl Page {
    /// Number of entries a page must hold for a queue of `total` items.
    pub fn expected_len(total: usize, index: usize, size: usize) -> usize {
        let start = index.saturating_mul(size);
        total.saturating_sub(start).min(size)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Transport state reported by the daemon
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Play,
    Pause,
    #[default]
    Stop,
}

impl PlayerState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "play" => Some(PlayerState::Play),
            "pause" => Some(PlayerState::Pause),
            "stop" => Some(PlayerState::Stop),
            _ => None,
        }
    }
}

/// Playback mode flags as the daemon stores them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackModes {
    pub random: bool,
    pub repeat: bool,
    pub single: bool,
    pub consume: bool,
    /// Crossfade duration in seconds, 0 when disabled
    pub crossfade: u32,
}

/// Daemon status fields read on every state tick
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub state: PlayerState,
    pub volume: Option<u8>,
    pub elapsed_ms: Option<u32>,
    pub duration_ms: Option<u32>,
    pub song_position: Option<usize>,
    pub queue_length: usize,
    pub modes: PlaybackModes,
}

/// Boolean view of the playback modes, both published to viewers and accepted
/// from them when they toggle a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModesPanel {
    pub random: bool,
    pub repeat: bool,
    pub single: bool,
    pub consume: bool,
    pub crossfade: bool,
}

impl From<&PlaybackModes> for ModesPanel {
    fn from(modes: &PlaybackModes) -> Self {
        Self {
            random: modes.random,
            repeat: modes.repeat,
            single: modes.single,
            consume: modes.consume,
            crossfade: modes.crossfade > 0,
        }
    }
}

/// Snapshot of the daemon built during one state tick and never mutated afterwards
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub connected: bool,
    pub status: DaemonStatus,
    pub modes_panel: ModesPanel,
    pub current_track: Option<QueueEntry>,
}

impl PlaybackState {
    pub fn new(status: DaemonStatus, current_track: Option<QueueEntry>) -> Self {
        let modes_panel = ModesPanel::from(&status.modes);
        Self {
            connected: true,
            status,
            modes_panel,
            current_track,
        }
    }
}

/// Album selector used by the album queue operations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    pub name: String,
    pub artist_name: Option<String>,
    pub date: Option<String>,
    pub genre: Option<String>,
}

impl AlbumRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist_name: None,
            date: None,
            genre: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist_name = Some(artist.into());
        self
    }
}
