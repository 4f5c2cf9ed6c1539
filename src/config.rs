//! Command line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::model::{EXCLUSION_FILE_NAME, MpdSettings, DEFAULT_STATUS_EXPIRY};

const STATE_DIR_NAME: &str = ".mpd-mirror";

#[derive(Parser, Debug)]
#[command(name = "mpd-mirror", version, about = "Mirror and control an MPD queue")]
pub struct Config {
    /// MPD host
    #[arg(long, env = "MPD_HOST", default_value = "localhost")]
    pub host: String,

    /// MPD port
    #[arg(long, env = "MPD_PORT", default_value_t = 6600)]
    pub port: u16,

    /// MPD password
    #[arg(long, env = "MPD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// MPD music directory; files can only be excluded if they exist under it
    #[arg(long, env = "MPD_MUSIC_DIR")]
    pub music_dir: Option<PathBuf>,

    /// Where the exclusion list is kept (default: ~/.mpd-mirror)
    #[arg(long, env = "MPD_MIRROR_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Timeout for every exchange with MPD, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Turn off random/repeat/single/consume/crossfade when the queue is cleared
    #[arg(long, env = "MPD_MIRROR_RESET_MODES_ON_CLEAR")]
    pub reset_modes_on_clear: bool,

    #[arg(long, env = "MPD_MIRROR_LOG_DIR", default_value = ".logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish queue and state snapshots every period and print them as JSON lines
    Watch {
        #[arg(long, default_value_t = 1000)]
        period_ms: u64,
    },
    /// Print one page of the queue
    Page { index: usize, size: usize },
    /// Print the whole queue
    Queue,
    AddTracks {
        #[arg(required = true)]
        files: Vec<String>,
    },
    AddDir { dir: String },
    AddAlbum(AlbumArgs),
    /// Add an album and start playing it
    PlayAlbum(AlbumArgs),
    AddPlaylist { name: String },
    /// Add a file and start playing it
    AddPlayTrack { file: String },
    /// Play a file that is already queued
    PlayTrack { file: String },
    Remove { position: usize },
    Move { from: usize, to: usize },
    Clear,
    /// Set every playback mode at once; unset flags turn the mode off
    Modes(ModesArgs),
    /// Exclude a file from online cover lookups
    Exclude { file: String },
    IsExcluded { file: String },
    /// List excluded files
    Excluded,
}

#[derive(Args, Debug)]
pub struct AlbumArgs {
    pub name: String,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
}

#[derive(Args, Debug)]
pub struct ModesArgs {
    #[arg(long)]
    pub random: bool,
    #[arg(long)]
    pub repeat: bool,
    #[arg(long)]
    pub single: bool,
    #[arg(long)]
    pub consume: bool,
    #[arg(long)]
    pub crossfade: bool,
}

impl Config {
    pub fn mpd_settings(&self) -> MpdSettings {
        MpdSettings {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone().filter(|p| !p.is_empty()),
            timeout: Duration::from_millis(self.timeout_ms),
            status_expiry: DEFAULT_STATUS_EXPIRY,
        }
    }

    /// Exclusion list location, `None` when no state directory can be found.
    pub fn exclusion_file(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(STATE_DIR_NAME)))
            .map(|dir| dir.join(EXCLUSION_FILE_NAME))
    }

    /// Media root for exclusion checks, `None` when not configured.
    pub fn music_dir(&self) -> Option<PathBuf> {
        self.music_dir.clone()
    }
}
