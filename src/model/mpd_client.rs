//! Client for the MPD text protocol over a single TCP session

use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::error::{Result, SyncError};
use super::daemon::DaemonClient;
use super::types::{AlbumRef, DaemonStatus, PlaybackModes, PlayerState, QueueEntry};

const GREETING_PREFIX: &str = "OK MPD ";
const ACK_ERROR_ARG: u32 = 2;

pub const DEFAULT_STATUS_EXPIRY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct MpdSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub timeout: Duration,
    pub status_expiry: Duration,
}

impl Default for MpdSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6600,
            password: None,
            timeout: Duration::from_secs(3),
            status_expiry: DEFAULT_STATUS_EXPIRY,
        }
    }
}

struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

type Pairs = Vec<(String, String)>;

impl Session {
    /// Send one command line and collect the `key: value` pairs up to `OK`.
    async fn exchange(&mut self, line: &str, command: &str) -> Result<Pairs> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut pairs = Vec::new();
        loop {
            let response = self.read_line().await?;
            if response == "OK" {
                return Ok(pairs);
            }
            if response.starts_with("ACK ") {
                return Err(parse_ack(&response, command));
            }
            match response.split_once(": ") {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => {
                    return Err(SyncError::protocol(format!(
                        "unexpected line '{}' in answer to {}",
                        response, command
                    )));
                }
            }
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "daemon closed the connection",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// MPD connection shared by the broadcaster and every request handler.
///
/// All traffic goes through one session guarded by an async mutex, so each
/// command and its answer are exchanged without interleaving.
pub struct MpdClient {
    settings: MpdSettings,
    session: Mutex<Option<Session>>,
    status_cache: StdMutex<Option<(Instant, DaemonStatus)>>,
}

impl MpdClient {
    pub fn new(settings: MpdSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
            status_cache: StdMutex::new(None),
        }
    }

    /// Open the session eagerly so configuration errors show up at startup.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_session().await?);
        }
        Ok(())
    }

    async fn open_session(&self) -> Result<Session> {
        let address = (self.settings.host.as_str(), self.settings.port);
        let stream = match tokio::time::timeout(self.settings.timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(host = %self.settings.host, port = self.settings.port, error = %e, "MPD connection failed");
                return Err(SyncError::Unreachable);
            }
            Err(_) => {
                tracing::debug!(host = %self.settings.host, port = self.settings.port, "MPD connection timed out");
                return Err(SyncError::Unreachable);
            }
        };

        let (read_half, writer) = stream.into_split();
        let mut session = Session {
            reader: BufReader::new(read_half),
            writer,
        };

        let handshake = async {
            let greeting = session.read_line().await?;
            let Some(version) = greeting.strip_prefix(GREETING_PREFIX) else {
                return Err(SyncError::protocol(format!("unexpected greeting '{}'", greeting)));
            };
            tracing::info!(host = %self.settings.host, version, "Connected to MPD");

            if let Some(password) = &self.settings.password {
                session
                    .exchange(&format_command("password", &[password]), "password")
                    .await?;
            }
            Ok::<(), SyncError>(())
        };
        match tokio::time::timeout(self.settings.timeout, handshake).await {
            Ok(result) => result?,
            Err(_) => return Err(SyncError::Timeout("handshake")),
        }

        Ok(session)
    }

    /// Run a command on the shared session, reconnecting first if needed.
    async fn run(&self, command: &'static str, args: &[&str]) -> Result<Pairs> {
        let line = format_command(command, args);
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_session().await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(SyncError::Unreachable);
        };

        tracing::trace!(command, "MPD request");
        let result = match tokio::time::timeout(self.settings.timeout, session.exchange(&line, command)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(command)),
        };

        if let Err(e) = &result {
            if e.breaks_connection() {
                tracing::warn!(command, error = %e, "Dropping MPD session");
                *guard = None;
            } else {
                tracing::debug!(command, error = %e, "MPD command failed");
            }
        }
        result
    }

    /// Run a mutation and forget the cached status it made stale.
    async fn mutate(&self, command: &'static str, args: &[&str]) -> Result<()> {
        let result = self.run(command, args).await.map(|_| ());
        self.forget_status();
        result
    }

    fn forget_status(&self) {
        *self.status_cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn fetch_status(&self) -> Result<DaemonStatus> {
        let pairs = self.run("status", &[]).await?;
        let status = parse_status(&pairs)?;
        *self.status_cache.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), status.clone()));
        Ok(status)
    }

    fn cached_status(&self) -> Option<DaemonStatus> {
        let cache = self.status_cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .as_ref()
            .filter(|(fetched_at, _)| fetched_at.elapsed() < self.settings.status_expiry)
            .map(|(_, status)| status.clone())
    }

    async fn set_flag(&self, command: &'static str, on: bool) -> Result<()> {
        self.mutate(command, &[if on { "1" } else { "0" }]).await
    }
}

#[async_trait]
impl DaemonClient for MpdClient {
    async fn is_connected(&self) -> bool {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return true;
        }
        match self.open_session().await {
            Ok(session) => {
                *guard = Some(session);
                true
            }
            Err(e) => {
                tracing::trace!(error = %e, "MPD still unreachable");
                false
            }
        }
    }

    async fn invalidate_cache(&self) {
        self.forget_status();
    }

    async fn queue_length(&self) -> Result<usize> {
        // Always fresh: pagination compares lengths taken moments apart.
        Ok(self.fetch_status().await?.queue_length)
    }

    async fn queue_slice(&self, offset: usize, limit: usize) -> Result<Vec<QueueEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let range = format!("{}:{}", offset, offset.saturating_add(limit));
        match self.run("playlistinfo", &[&range]).await {
            Ok(pairs) => parse_songs(&pairs),
            // The queue ends before `offset`.
            Err(SyncError::DaemonRejected { code: ACK_ERROR_ARG, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn status(&self) -> Result<DaemonStatus> {
        if let Some(status) = self.cached_status() {
            return Ok(status);
        }
        self.fetch_status().await
    }

    async fn current_track(&self) -> Result<Option<QueueEntry>> {
        let pairs = self.run("currentsong", &[]).await?;
        Ok(parse_songs(&pairs)?.into_iter().next())
    }

    async fn add(&self, uri: &str) -> Result<()> {
        self.mutate("add", &[uri]).await
    }

    async fn add_album(&self, album: &AlbumRef) -> Result<()> {
        let mut args = vec!["album", album.name.as_str()];
        if let Some(artist) = &album.artist_name {
            args.extend(["albumartist", artist.as_str()]);
        }
        if let Some(date) = &album.date {
            args.extend(["date", date.as_str()]);
        }
        if let Some(genre) = &album.genre {
            args.extend(["genre", genre.as_str()]);
        }
        self.mutate("findadd", &args).await
    }

    async fn load_playlist(&self, name: &str) -> Result<()> {
        self.mutate("load", &[name]).await
    }

    async fn remove(&self, position: usize) -> Result<()> {
        self.mutate("delete", &[&position.to_string()]).await
    }

    async fn move_entry(&self, from: usize, to: usize) -> Result<()> {
        self.mutate("move", &[&from.to_string(), &to.to_string()]).await
    }

    async fn play_position(&self, position: usize) -> Result<()> {
        self.mutate("play", &[&position.to_string()]).await
    }

    async fn find_position(&self, file: &str) -> Result<Option<usize>> {
        let pairs = self.run("playlistfind", &["file", file]).await?;
        Ok(parse_songs(&pairs)?.first().map(|entry| entry.position))
    }

    async fn clear(&self) -> Result<()> {
        self.mutate("clear", &[]).await
    }

    async fn set_random(&self, on: bool) -> Result<()> {
        self.set_flag("random", on).await
    }

    async fn set_repeat(&self, on: bool) -> Result<()> {
        self.set_flag("repeat", on).await
    }

    async fn set_single(&self, on: bool) -> Result<()> {
        self.set_flag("single", on).await
    }

    async fn set_consume(&self, on: bool) -> Result<()> {
        self.set_flag("consume", on).await
    }

    async fn set_crossfade(&self, seconds: u32) -> Result<()> {
        self.mutate("crossfade", &[&seconds.to_string()]).await
    }
}

/// Build a command line, quoting every argument.
pub fn format_command(command: &str, args: &[&str]) -> String {
    let mut line = command.to_string();
    for arg in args {
        line.push_str(" \"");
        for c in arg.chars() {
            if c == '"' || c == '\\' {
                line.push('\\');
            }
            line.push(c);
        }
        line.push('"');
    }
    line
}

/// Parse `ACK [code@index] {command} message`.
fn parse_ack(line: &str, command: &str) -> SyncError {
    let rest = line.trim_start_matches("ACK ").trim();
    let code = rest
        .strip_prefix('[')
        .and_then(|r| r.split_once('@'))
        .and_then(|(code, _)| code.parse().ok())
        .unwrap_or(0);
    let failed_command = rest
        .split_once('{')
        .and_then(|(_, r)| r.split_once('}'))
        .map(|(c, _)| c.to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| command.to_string());
    let message = rest
        .split_once('}')
        .map(|(_, m)| m.trim().to_string())
        .unwrap_or_else(|| rest.to_string());

    SyncError::DaemonRejected {
        code,
        command: failed_command,
        message,
    }
}

fn parse_flag(value: &str) -> bool {
    // `single` may also be "oneshot"
    value != "0"
}

fn seconds_to_ms(value: &str) -> Option<u32> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0).round() as u32)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SyncError::protocol(format!("invalid {} value '{}'", key, value)))
}

pub fn parse_status(pairs: &[(String, String)]) -> Result<DaemonStatus> {
    let mut status = DaemonStatus::default();
    let mut modes = PlaybackModes::default();

    for (key, value) in pairs {
        match key.as_str() {
            "state" => {
                status.state = PlayerState::parse(value)
                    .ok_or_else(|| SyncError::protocol(format!("unknown state '{}'", value)))?;
            }
            "volume" => {
                let volume: i32 = parse_number(key, value)?;
                status.volume = u8::try_from(volume).ok();
            }
            "elapsed" => status.elapsed_ms = seconds_to_ms(value),
            "duration" => status.duration_ms = seconds_to_ms(value),
            "song" => status.song_position = Some(parse_number(key, value)?),
            "playlistlength" => status.queue_length = parse_number(key, value)?,
            "random" => modes.random = parse_flag(value),
            "repeat" => modes.repeat = parse_flag(value),
            "single" => modes.single = parse_flag(value),
            "consume" => modes.consume = parse_flag(value),
            "xfade" => modes.crossfade = parse_number(key, value)?,
            _ => {}
        }
    }

    status.modes = modes;
    Ok(status)
}

/// Split a song listing into entries; every entry starts with a `file` key.
pub fn parse_songs(pairs: &[(String, String)]) -> Result<Vec<QueueEntry>> {
    let mut entries: Vec<QueueEntry> = Vec::new();
    let mut has_position = false;

    for (key, value) in pairs {
        if key == "file" {
            if let Some(last) = entries.last() {
                if !has_position {
                    return Err(SyncError::protocol(format!("entry '{}' has no position", last.file)));
                }
            }
            entries.push(QueueEntry::new(0, value.clone()));
            has_position = false;
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            continue;
        };
        match key.as_str() {
            "Pos" => {
                entry.position = parse_number(key, value)?;
                has_position = true;
            }
            "Id" => entry.id = Some(parse_number(key, value)?),
            "Title" => entry.title = Some(value.clone()),
            "Artist" => entry.artist = Some(value.clone()),
            "Album" => entry.album = Some(value.clone()),
            "duration" => entry.duration_ms = seconds_to_ms(value),
            "Time" if entry.duration_ms.is_none() => entry.duration_ms = seconds_to_ms(value),
            _ => {}
        }
    }

    if let Some(last) = entries.last() {
        if !has_position {
            return Err(SyncError::protocol(format!("entry '{}' has no position", last.file)));
        }
    }
    Ok(entries)
}
