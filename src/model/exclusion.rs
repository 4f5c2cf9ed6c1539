//! Persisted set of files whose covers must not be looked up online

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::SyncError;

pub const EXCLUSION_FILE_NAME: &str = "cover-blacklist";

/// Exclusion list backed by a newline-delimited file.
///
/// The in-memory set is authoritative for the process lifetime; the file is
/// rewritten in full after every successful add and a failed write is only
/// logged.
#[derive(Clone)]
pub struct ExclusionStore {
    excluded: Arc<RwLock<HashSet<String>>>,
    writer: Arc<Mutex<()>>,
    media_root: Option<PathBuf>,
    file: Option<PathBuf>,
}

impl ExclusionStore {
    /// Build the store and load whatever the backing file holds.
    ///
    /// `file` is `None` when no state directory could be determined; the store
    /// then lives in memory only. Without a `media_root` nothing can be added.
    pub fn open(media_root: Option<PathBuf>, file: Option<PathBuf>) -> Self {
        let excluded = match &file {
            Some(path) => match load(path) {
                Ok(ids) => {
                    tracing::info!(path = %path.display(), count = ids.len(), "Exclusion list loaded");
                    ids
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not load the exclusion list, starting empty");
                    HashSet::new()
                }
            },
            None => {
                tracing::warn!("No exclusion list file configured, exclusions will not survive a restart");
                HashSet::new()
            }
        };

        Self {
            excluded: Arc::new(RwLock::new(excluded)),
            writer: Arc::new(Mutex::new(())),
            media_root,
            file,
        }
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        let excluded = self.excluded.read().unwrap_or_else(PoisonError::into_inner);
        match normalize(id) {
            Some(key) => excluded.contains(&key),
            None => excluded.contains(id),
        }
    }

    /// Mark `id` as excluded. Returns `false`, leaving the set untouched, when
    /// `id` is not an existing file under the media root.
    pub fn add(&self, id: &str) -> bool {
        let Some(media_root) = &self.media_root else {
            tracing::warn!(id, "No music directory configured, refusing to exclude");
            return false;
        };
        let Some(key) = normalize(id).filter(|key| media_root.join(key).is_file()) else {
            tracing::warn!(id, media_root = %media_root.display(), "Refusing to exclude a file that does not exist");
            return false;
        };

        let inserted = {
            let mut excluded = self.excluded.write().unwrap_or_else(PoisonError::into_inner);
            excluded.insert(key)
        };

        if inserted {
            tracing::info!(id, "File added to the exclusion list");
        } else {
            tracing::debug!(id, "File already excluded");
        }

        if let Err(e) = self.flush() {
            tracing::error!(id, error = %e, "Exclusion list not persisted, keeping it in memory");
        }
        true
    }

    pub fn list_all(&self) -> HashSet<String> {
        self.excluded.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn media_root(&self) -> Option<&Path> {
        self.media_root.as_deref()
    }

    /// Rewrite the backing file with the full current set.
    fn flush(&self) -> Result<(), SyncError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        // Flushes are serialized and each one snapshots after taking the writer
        // lock, so the last flush on disk always carries every insert.
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buffer = String::new();
        {
            let excluded = self.excluded.read().unwrap_or_else(PoisonError::into_inner);
            for id in excluded.iter() {
                buffer.push_str(id);
                buffer.push('\n');
            }
        }

        save(path, buffer.as_bytes()).map_err(SyncError::Persistence)
    }
}

/// Canonical key for a path relative to the media root: its normal
/// components joined by `/`. `None` for empty, absolute or `..` paths.
fn normalize(id: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(id).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Read the exclusion file, one identifier per line.
pub fn load(path: &Path) -> io::Result<HashSet<String>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            ids.insert(line);
        }
    }
    Ok(ids)
}

fn save(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
