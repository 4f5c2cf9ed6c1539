//! In-memory daemon used by the unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use super::daemon::DaemonClient;
use super::types::{AlbumRef, DaemonStatus, PlayerState, QueueEntry};

#[derive(Default)]
struct Inner {
    queue: Vec<QueueEntry>,
    status: DaemonStatus,
    albums: Vec<(AlbumRef, Vec<String>)>,
    playlists: Vec<(String, Vec<String>)>,
    /// Entries dropped from the tail right after the next length query answers.
    shrink_after_length: usize,
    /// Entries appended right after the next length query answers.
    grow_after_length: usize,
    /// Entries dropped from the tail after every slice query.
    shrink_after_each_slice: usize,
}

pub struct MemoryDaemon {
    inner: Mutex<Inner>,
    connected: AtomicBool,
    fail_reads: AtomicBool,
    pub invalidations: AtomicUsize,
    pub length_queries: AtomicUsize,
    pub slice_queries: AtomicUsize,
}

impl MemoryDaemon {
    pub fn with_files(files: &[&str]) -> Self {
        let daemon = Self {
            inner: Mutex::new(Inner::default()),
            connected: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            invalidations: AtomicUsize::new(0),
            length_queries: AtomicUsize::new(0),
            slice_queries: AtomicUsize::new(0),
        };
        {
            let mut inner = daemon.inner.lock().unwrap();
            for file in files {
                push_file(&mut inner.queue, file);
            }
        }
        daemon
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn shrink_after_next_length(&self, count: usize) {
        self.inner.lock().unwrap().shrink_after_length = count;
    }

    /// Keep a concurrent writer removing `count` entries after every slice.
    pub fn shrink_after_each_slice(&self, count: usize) {
        self.inner.lock().unwrap().shrink_after_each_slice = count;
    }

    pub fn grow_after_next_length(&self, count: usize) {
        self.inner.lock().unwrap().grow_after_length = count;
    }

    pub fn insert_album(&self, album: AlbumRef, files: &[&str]) {
        let files = files.iter().map(|f| f.to_string()).collect();
        self.inner.lock().unwrap().albums.push((album, files));
    }

    pub fn insert_playlist(&self, name: &str, files: &[&str]) {
        let files = files.iter().map(|f| f.to_string()).collect();
        self.inner.lock().unwrap().playlists.push((name.to_string(), files));
    }

    pub fn set_status(&self, status: DaemonStatus) {
        self.inner.lock().unwrap().status = status;
    }

    pub fn status_snapshot(&self) -> DaemonStatus {
        self.inner.lock().unwrap().status.clone()
    }

    pub fn files(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .queue
            .iter()
            .map(|e| e.file.clone())
            .collect()
    }

    fn check_read(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::Unreachable);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Timeout("memory read"));
        }
        Ok(())
    }
}

fn push_file(queue: &mut Vec<QueueEntry>, file: &str) {
    let position = queue.len();
    let mut entry = QueueEntry::new(position, file);
    entry.title = Some(format!("Track {}", position));
    queue.push(entry);
}

fn renumber(queue: &mut [QueueEntry]) {
    for (position, entry) in queue.iter_mut().enumerate() {
        entry.position = position;
    }
}

fn bad_index(command: &str) -> SyncError {
    SyncError::DaemonRejected {
        code: 2,
        command: command.to_string(),
        message: "Bad song index".to_string(),
    }
}

#[async_trait]
impl DaemonClient for MemoryDaemon {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    async fn queue_length(&self) -> Result<usize> {
        self.check_read()?;
        self.length_queries.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let len = inner.queue.len();
        let shrink = std::mem::take(&mut inner.shrink_after_length);
        let keep = inner.queue.len().saturating_sub(shrink);
        inner.queue.truncate(keep);
        let grow = std::mem::take(&mut inner.grow_after_length);
        for n in 0..grow {
            push_file(&mut inner.queue, &format!("grown/{}.flac", n));
        }
        Ok(len)
    }

    async fn queue_slice(&self, offset: usize, limit: usize) -> Result<Vec<QueueEntry>> {
        self.check_read()?;
        self.slice_queries.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let slice: Vec<QueueEntry> = inner.queue.iter().skip(offset).take(limit).cloned().collect();
        let keep = inner.queue.len().saturating_sub(inner.shrink_after_each_slice);
        inner.queue.truncate(keep);
        Ok(slice)
    }

    async fn status(&self) -> Result<DaemonStatus> {
        self.check_read()?;
        let inner = self.inner.lock().unwrap();
        let mut status = inner.status.clone();
        status.queue_length = inner.queue.len();
        Ok(status)
    }

    async fn current_track(&self) -> Result<Option<QueueEntry>> {
        self.check_read()?;
        let inner = self.inner.lock().unwrap();
        if inner.status.state == PlayerState::Stop {
            return Ok(None);
        }
        Ok(inner
            .status
            .song_position
            .and_then(|pos| inner.queue.get(pos).cloned()))
    }

    async fn add(&self, uri: &str) -> Result<()> {
        self.check_read()?;
        push_file(&mut self.inner.lock().unwrap().queue, uri);
        Ok(())
    }

    async fn add_album(&self, album: &AlbumRef) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        let files = inner
            .albums
            .iter()
            .find(|(a, _)| a.name == album.name)
            .map(|(_, files)| files.clone())
            .unwrap_or_default();
        for file in files {
            push_file(&mut inner.queue, &file);
        }
        Ok(())
    }

    async fn load_playlist(&self, name: &str) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(files) = inner
            .playlists
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, files)| files.clone())
        else {
            return Err(SyncError::DaemonRejected {
                code: 50,
                command: "load".to_string(),
                message: "No such playlist".to_string(),
            });
        };
        for file in files {
            push_file(&mut inner.queue, &file);
        }
        Ok(())
    }

    async fn remove(&self, position: usize) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        if position >= inner.queue.len() {
            return Err(bad_index("delete"));
        }
        inner.queue.remove(position);
        renumber(&mut inner.queue);
        Ok(())
    }

    async fn move_entry(&self, from: usize, to: usize) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        if from >= inner.queue.len() || to >= inner.queue.len() {
            return Err(bad_index("move"));
        }
        let entry = inner.queue.remove(from);
        inner.queue.insert(to, entry);
        renumber(&mut inner.queue);
        Ok(())
    }

    async fn play_position(&self, position: usize) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        if position >= inner.queue.len() {
            return Err(bad_index("play"));
        }
        inner.status.state = PlayerState::Play;
        inner.status.song_position = Some(position);
        Ok(())
    }

    async fn find_position(&self, file: &str) -> Result<Option<usize>> {
        self.check_read()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.queue.iter().find(|e| e.file == file).map(|e| e.position))
    }

    async fn clear(&self) -> Result<()> {
        self.check_read()?;
        let mut inner = self.inner.lock().unwrap();
        inner.queue.clear();
        inner.status.state = PlayerState::Stop;
        inner.status.song_position = None;
        Ok(())
    }

    async fn set_random(&self, on: bool) -> Result<()> {
        self.check_read()?;
        self.inner.lock().unwrap().status.modes.random = on;
        Ok(())
    }

    async fn set_repeat(&self, on: bool) -> Result<()> {
        self.check_read()?;
        self.inner.lock().unwrap().status.modes.repeat = on;
        Ok(())
    }

    async fn set_single(&self, on: bool) -> Result<()> {
        self.check_read()?;
        self.inner.lock().unwrap().status.modes.single = on;
        Ok(())
    }

    async fn set_consume(&self, on: bool) -> Result<()> {
        self.check_read()?;
        self.inner.lock().unwrap().status.modes.consume = on;
        Ok(())
    }

    async fn set_crossfade(&self, seconds: u32) -> Result<()> {
        self.check_read()?;
        self.inner.lock().unwrap().status.modes.crossfade = seconds;
        Ok(())
    }
}
