//! Contract required of the connection to the playback daemon

use async_trait::async_trait;

use crate::error::Result;
use super::types::{AlbumRef, DaemonStatus, QueueEntry};

/// A single, stateful session with the remote daemon.
///
/// One instance is created at startup and shared (`Arc<dyn DaemonClient>`)
/// between the broadcaster and every request handler. Implementations must
/// serialize concurrent commands and queries over their one connection; callers
/// never open a second session to work around contention.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Drop any cached status so the next read goes to the daemon.
    async fn invalidate_cache(&self);

    async fn queue_length(&self) -> Result<usize>;

    /// At most `limit` entries starting at `offset`; empty when `offset` is past the end.
    async fn queue_slice(&self, offset: usize, limit: usize) -> Result<Vec<QueueEntry>>;

    async fn status(&self) -> Result<DaemonStatus>;

    async fn current_track(&self) -> Result<Option<QueueEntry>>;

    /// Append a file or a whole directory to the queue.
    async fn add(&self, uri: &str) -> Result<()>;

    async fn add_album(&self, album: &AlbumRef) -> Result<()>;

    async fn load_playlist(&self, name: &str) -> Result<()>;

    async fn remove(&self, position: usize) -> Result<()>;

    async fn move_entry(&self, from: usize, to: usize) -> Result<()>;

    async fn play_position(&self, position: usize) -> Result<()>;

    /// Position of the first queued entry for `file`, if any.
    async fn find_position(&self, file: &str) -> Result<Option<usize>>;

    async fn clear(&self) -> Result<()>;

    async fn set_random(&self, on: bool) -> Result<()>;

    async fn set_repeat(&self, on: bool) -> Result<()>;

    async fn set_single(&self, on: bool) -> Result<()>;

    async fn set_consume(&self, on: bool) -> Result<()>;

    async fn set_crossfade(&self, seconds: u32) -> Result<()>;
}
