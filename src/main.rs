use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use mpd_mirror::config::{AlbumArgs, Command, Config};
use mpd_mirror::controller::{AppController, Envelope, Topic};
use mpd_mirror::log_command_result;
use mpd_mirror::model::{AlbumRef, ExclusionStore, ModesPanel, MpdClient};
use mpd_mirror::{logging, SyncError};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== mpd-mirror starting ===");

    let mpd = Arc::new(MpdClient::new(config.mpd_settings()));
    let exclusions = ExclusionStore::open(config.music_dir(), config.exclusion_file());
    let controller = AppController::new(mpd.clone(), exclusions, config.reset_modes_on_clear);

    let result = run_command(&controller, &mpd, config.command).await;

    if let Err(err) = &result {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("mpd-mirror shutting down");
    result
}

/// Print every published envelope until Ctrl-C.
async fn watch(controller: &AppController, period: Duration) -> Result<()> {
    let mut queue_rx = controller.hub.subscribe(Topic::Queue);
    let mut state_rx = controller.hub.subscribe(Topic::State);
    let broadcaster = controller.start_broadcaster(period);

    let result = loop {
        let received = tokio::select! {
            envelope = queue_rx.recv() => envelope,
            envelope = state_rx.recv() => envelope,
            signal = tokio::signal::ctrl_c() => {
                break signal.context("Failed to listen for Ctrl-C");
            }
        };

        match received {
            Ok(envelope) => {
                if let Err(e) = print_envelope(&envelope) {
                    break Err(e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Viewer fell behind, snapshots dropped");
            }
            Err(RecvError::Closed) => break Ok(()),
        }
    };

    broadcaster.shutdown().await;
    result
}

fn print_envelope(envelope: &Envelope) -> Result<()> {
    let line = serde_json::to_string(envelope).context("Failed to encode snapshot")?;
    println!("{}", line);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", text);
    Ok(())
}

fn friendly(error: SyncError) -> anyhow::Error {
    anyhow::anyhow!(AppController::format_error(&error))
}

fn album_ref(args: AlbumArgs) -> AlbumRef {
    AlbumRef {
        name: args.name,
        artist_name: args.artist,
        date: args.date,
        genre: args.genre,
    }
}

async fn run_command(controller: &AppController, mpd: &MpdClient, command: Command) -> Result<()> {
    let queue = &controller.queue;

    match command {
        Command::Watch { period_ms } => {
            if let Err(e) = mpd.connect().await {
                tracing::warn!(error = %e, "MPD not reachable yet, broadcaster starts idle");
                eprintln!("{}", AppController::format_error(&e));
            }
            watch(controller, Duration::from_millis(period_ms)).await
        }
        Command::Page { index, size } => {
            let page = queue.get_page(index, size).await.map_err(friendly)?;
            print_json(&page)
        }
        Command::Queue => {
            let entries = queue.full_queue().await.map_err(friendly)?;
            print_json(&entries)
        }
        Command::AddTracks { files } => {
            let result = queue.add_tracks(&files).await;
            log_command_result!("add_tracks", result);
            result.map_err(friendly)
        }
        Command::AddDir { dir } => {
            let result = queue.add_dir(&dir).await;
            log_command_result!("add_dir", result);
            result.map_err(friendly)
        }
        Command::AddAlbum(args) => {
            let result = queue.add_album(&album_ref(args)).await;
            log_command_result!("add_album", result);
            result.map_err(friendly)
        }
        Command::PlayAlbum(args) => {
            let result = queue.add_play_album(&album_ref(args)).await;
            log_command_result!("add_play_album", result);
            result.map_err(friendly)
        }
        Command::AddPlaylist { name } => {
            let result = queue.add_playlist(&name).await;
            log_command_result!("add_playlist", result);
            result.map_err(friendly)
        }
        Command::AddPlayTrack { file } => {
            let result = queue.add_play_track(&file).await;
            log_command_result!("add_play_track", result);
            result.map_err(friendly)
        }
        Command::PlayTrack { file } => {
            let result = queue.play_track(&file).await;
            log_command_result!("play_track", result);
            result.map_err(friendly)
        }
        Command::Remove { position } => {
            let result = queue.remove_track(position).await;
            log_command_result!("remove_track", result);
            result.map_err(friendly)
        }
        Command::Move { from, to } => {
            let result = queue.move_track(from, to).await;
            log_command_result!("move_track", result);
            result.map_err(friendly)
        }
        Command::Clear => {
            let result = queue.clear().await;
            log_command_result!("clear", result);
            result.map_err(friendly)
        }
        Command::Modes(args) => {
            let panel = ModesPanel {
                random: args.random,
                repeat: args.repeat,
                single: args.single,
                consume: args.consume,
                crossfade: args.crossfade,
            };
            let result = controller.control_panel.apply(&panel).await;
            log_command_result!("modes", result);
            result.map_err(friendly)
        }
        Command::Exclude { file } => {
            let Some(media_root) = controller.exclusions.media_root() else {
                anyhow::bail!("Set --music-dir or MPD_MUSIC_DIR to exclude files");
            };
            if !controller.exclusions.add(&file) {
                anyhow::bail!("{} is not a file under {}", file, media_root.display());
            }
            println!("{}", file);
            Ok(())
        }
        Command::IsExcluded { file } => print_json(&controller.exclusions.is_excluded(&file)),
        Command::Excluded => {
            let mut files: Vec<String> = controller.exclusions.list_all().into_iter().collect();
            files.sort();
            print_json(&files)
        }
    }
}
