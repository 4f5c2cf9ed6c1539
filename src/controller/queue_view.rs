//! Paginated view over the daemon queue plus queue mutations

use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::model::{AlbumRef, DaemonClient, Page, PlaybackModes, QueueEntry};
use super::control_panel::apply_modes;

/// Attempts at reading a page before settling for the freshest total.
pub const MAX_PAGE_ATTEMPTS: usize = 3;

/// Read/mutate proxy over the daemon's queue. Owns no data: every call goes to
/// the daemon, which is the only source of truth for ordering.
#[derive(Clone)]
pub struct QueueView {
    daemon: Arc<dyn DaemonClient>,
    reset_modes_on_clear: bool,
}

impl QueueView {
    pub fn new(daemon: Arc<dyn DaemonClient>) -> Self {
        Self {
            daemon,
            reset_modes_on_clear: false,
        }
    }

    pub fn with_reset_modes_on_clear(mut self, reset: bool) -> Self {
        self.reset_modes_on_clear = reset;
        self
    }

    /// Page `index` of `size` entries.
    ///
    /// The reported total is always a length observed after the entries were
    /// fetched, and the entries never exceed what that total allows.
    pub async fn get_page(&self, index: usize, size: usize) -> Result<Page> {
        if size == 0 {
            return Err(SyncError::invalid_argument("page size must be positive"));
        }
        let offset = index.saturating_mul(size);

        let mut total = self.daemon.queue_length().await?;
        let mut attempt = 1;
        loop {
            let expected = Page::expected_len(total, index, size);
            let mut entries = if expected == 0 {
                Vec::new()
            } else {
                self.daemon.queue_slice(offset, expected).await?
            };
            let observed = self.daemon.queue_length().await?;

            if observed == total && entries.len() == expected {
                return Ok(Page {
                    index,
                    size,
                    total: observed,
                    entries,
                });
            }

            tracing::debug!(
                attempt,
                before = total,
                after = observed,
                fetched = entries.len(),
                "Queue changed while reading a page"
            );

            if attempt >= MAX_PAGE_ATTEMPTS {
                entries.truncate(Page::expected_len(observed, index, size));
                return Ok(Page {
                    index,
                    size,
                    total: observed,
                    entries,
                });
            }
            total = observed;
            attempt += 1;
        }
    }

    /// The whole queue as a single page.
    pub async fn full_queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.get_page(0, usize::MAX).await?.entries)
    }

    pub async fn add_tracks(&self, files: &[String]) -> Result<()> {
        for file in files {
            self.daemon.add(file).await?;
        }
        tracing::info!(count = files.len(), "Tracks added to queue");
        Ok(())
    }

    pub async fn add_dir(&self, dir: &str) -> Result<()> {
        self.daemon.add(dir).await?;
        tracing::info!(dir, "Directory added to queue");
        Ok(())
    }

    pub async fn add_album(&self, album: &AlbumRef) -> Result<()> {
        self.daemon.add_album(album).await?;
        tracing::info!(album = %album.name, artist = ?album.artist_name, "Album added to queue");
        Ok(())
    }

    /// Append an album and start playing its first track.
    pub async fn add_play_album(&self, album: &AlbumRef) -> Result<()> {
        let first = self.daemon.queue_length().await?;
        self.daemon.add_album(album).await?;
        let len = self.daemon.queue_length().await?;
        if len <= first {
            tracing::warn!(album = %album.name, "Album matched no tracks, nothing to play");
            return Ok(());
        }
        self.daemon.play_position(first).await?;
        tracing::info!(album = %album.name, position = first, "Playing album");
        Ok(())
    }

    pub async fn add_playlist(&self, name: &str) -> Result<()> {
        self.daemon.load_playlist(name).await?;
        tracing::info!(playlist = name, "Playlist added to queue");
        Ok(())
    }

    pub async fn add_play_track(&self, file: &str) -> Result<()> {
        self.daemon.add(file).await?;
        self.play_track(file).await
    }

    /// Play a file that is already queued.
    pub async fn play_track(&self, file: &str) -> Result<()> {
        let Some(position) = self.daemon.find_position(file).await? else {
            return Err(SyncError::invalid_argument(format!("{} is not in the queue", file)));
        };
        self.daemon.play_position(position).await?;
        tracing::info!(file, position, "Playing track");
        Ok(())
    }

    /// Remove the entry at `position` as the caller last saw it. The daemon
    /// rejects positions that are no longer valid.
    pub async fn remove_track(&self, position: usize) -> Result<()> {
        self.daemon.remove(position).await?;
        tracing::info!(position, "Track removed from queue");
        Ok(())
    }

    pub async fn move_track(&self, from: usize, to: usize) -> Result<()> {
        self.daemon.move_entry(from, to).await?;
        tracing::info!(from, to, "Track moved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.daemon.clear().await?;
        if self.reset_modes_on_clear {
            apply_modes(self.daemon.as_ref(), &PlaybackModes::default()).await?;
        }
        tracing::info!(reset_modes = self.reset_modes_on_clear, "Queue cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use crate::model::PlayerState;
    use crate::model::memory::MemoryDaemon;

    fn files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("album/{:02}.flac", i)).collect()
    }

    fn view_with(n: usize) -> (Arc<MemoryDaemon>, QueueView) {
        let names = files(n);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let daemon = Arc::new(MemoryDaemon::with_files(&refs));
        let view = QueueView::new(daemon.clone());
        (daemon, view)
    }

    fn positions(page: &Page) -> Vec<usize> {
        page.entries.iter().map(|e| e.position).collect()
    }

    #[tokio::test]
    async fn test_pages_over_five_entries() {
        let (_, view) = view_with(5);

        let page = view.get_page(1, 2).await.unwrap();
        assert_eq!(positions(&page), vec![2, 3]);
        assert_eq!(page.total, 5);

        let page = view.get_page(2, 2).await.unwrap();
        assert_eq!(positions(&page), vec![4]);
        assert_eq!(page.total, 5);

        let page = view.get_page(3, 2).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn test_page_length_matches_clamp() {
        for total in 0..7 {
            let (_, view) = view_with(total);
            for size in 1..5 {
                for index in 0..5 {
                    let page = view.get_page(index, size).await.unwrap();
                    let expected = (total as i64 - (index * size) as i64).clamp(0, size as i64);
                    assert_eq!(page.entries.len() as i64, expected, "total={total} size={size} index={index}");
                    assert_eq!(page.total, total);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_zero_page_size_is_invalid() {
        let (_, view) = view_with(3);
        assert!(matches!(
            view.get_page(0, 0).await,
            Err(SyncError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_page_after_shrink_reports_fresh_total() {
        let (daemon, view) = view_with(5);
        daemon.shrink_after_next_length(2);

        let page = view.get_page(1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(positions(&page), vec![2]);
        assert_eq!(page.entries.len(), Page::expected_len(page.total, 1, 2));
    }

    #[tokio::test]
    async fn test_page_settles_on_last_total_when_queue_keeps_shrinking() {
        let (daemon, view) = view_with(10);
        daemon.shrink_after_each_slice(2);

        // Lengths seen: 10, 8, 6, 4. Every slice holds three entries that the
        // next length no longer fully allows.
        let page = view.get_page(1, 3).await.unwrap();

        assert_eq!(daemon.length_queries.load(Ordering::SeqCst), MAX_PAGE_ATTEMPTS + 1);
        assert_eq!(daemon.slice_queries.load(Ordering::SeqCst), MAX_PAGE_ATTEMPTS);
        assert_eq!(page.total, 4);
        assert_eq!(page.entries.len(), Page::expected_len(page.total, 1, 3));
        assert_eq!(positions(&page), vec![3]);
    }

    #[tokio::test]
    async fn test_page_after_growth_reports_fresh_total() {
        let (daemon, view) = view_with(3);
        daemon.grow_after_next_length(3);

        let page = view.get_page(1, 2).await.unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(positions(&page), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_full_queue() {
        let (_, view) = view_with(4);
        let queue = view.full_queue().await.unwrap();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue[3].file, "album/03.flac");

        let (daemon, empty) = view_with(0);
        assert!(empty.full_queue().await.unwrap().is_empty());
        assert_eq!(daemon.slice_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_and_move() {
        let (daemon, view) = view_with(4);

        view.move_track(0, 3).await.unwrap();
        assert_eq!(daemon.files()[3], "album/00.flac");

        view.remove_track(3).await.unwrap();
        assert_eq!(daemon.files().len(), 3);
        assert!(!daemon.files().contains(&"album/00.flac".to_string()));
    }

    #[tokio::test]
    async fn test_stale_position_is_rejected_by_daemon() {
        let (_, view) = view_with(2);
        let err = view.remove_track(5).await.unwrap_err();
        assert!(matches!(err, SyncError::DaemonRejected { code: 2, .. }));
    }

    #[tokio::test]
    async fn test_add_play_track() {
        let (daemon, view) = view_with(2);
        view.add_play_track("single/hit.flac").await.unwrap();

        let status = daemon.status_snapshot();
        assert_eq!(status.state, PlayerState::Play);
        assert_eq!(status.song_position, Some(2));
    }

    #[tokio::test]
    async fn test_play_track_not_queued() {
        let (_, view) = view_with(2);
        assert!(matches!(
            view.play_track("nowhere.flac").await,
            Err(SyncError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_add_play_album_starts_at_first_new_track() {
        let (daemon, view) = view_with(3);
        let album = AlbumRef::new("Blue").with_artist("Joni");
        daemon.insert_album(album.clone(), &["blue/1.flac", "blue/2.flac"]);

        view.add_play_album(&album).await.unwrap();

        assert_eq!(daemon.files().len(), 5);
        assert_eq!(daemon.status_snapshot().song_position, Some(3));
    }

    #[tokio::test]
    async fn test_add_playlist_and_tracks() {
        let (daemon, view) = view_with(0);
        daemon.insert_playlist("mix", &["a.flac", "b.flac"]);

        view.add_playlist("mix").await.unwrap();
        view.add_tracks(&["c.flac".to_string()]).await.unwrap();
        view.add_dir("d").await.unwrap();
        assert_eq!(daemon.files(), vec!["a.flac", "b.flac", "c.flac", "d"]);

        assert!(matches!(
            view.add_playlist("missing").await,
            Err(SyncError::DaemonRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_resets_modes_when_configured() {
        let (daemon, view) = view_with(3);
        let view = view.with_reset_modes_on_clear(true);
        daemon.set_random(true).await.unwrap();
        daemon.set_crossfade(2).await.unwrap();

        view.clear().await.unwrap();

        assert!(daemon.files().is_empty());
        assert_eq!(daemon.status_snapshot().modes, PlaybackModes::default());
    }

    #[tokio::test]
    async fn test_clear_keeps_modes_by_default() {
        let (daemon, view) = view_with(3);
        daemon.set_repeat(true).await.unwrap();

        view.clear().await.unwrap();

        assert!(daemon.status_snapshot().modes.repeat);
    }
}
