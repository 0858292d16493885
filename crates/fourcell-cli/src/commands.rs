//! Subcommand implementations

use crate::perception::parse_grid;
use anyhow::{Context, Result, bail};
use fourcell_coordinator::TurnCoordinator;
use fourcell_core::{
    CameraBackend, CameraConfig, CellConfig, GameStateRecord, MoveSourceKind, NO_COLUMN, Readiness,
};
use fourcell_engine::DecisionEngine;
use fourcell_store::{Absorption, GameStateStore};
use frame_channel::{DeviceOpener, FrameChannel, RawDeviceOpener};
use robot_link::{EngineMoveSource, MoveSource, StoreMoveSource, inspect, run_link};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn store(config: &CellConfig) -> GameStateStore {
    GameStateStore::from_config(&config.store)
}

/// Print one readiness line and make sure it leaves the process
fn announce(readiness: &Readiness) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", readiness.to_payload())?;
    stdout.flush()?;
    Ok(())
}

fn device_opener(config: &CameraConfig) -> Result<Arc<dyn DeviceOpener>> {
    match config.backend {
        CameraBackend::Raw => Ok(Arc::new(RawDeviceOpener::from_config(config))),
        #[cfg(feature = "v4l")]
        CameraBackend::V4l => Ok(Arc::new(frame_channel::V4lDeviceOpener::from_config(config))),
        #[cfg(not(feature = "v4l"))]
        CameraBackend::V4l => bail!(
            "built without the v4l feature; rebuild with --features v4l or set camera.backend to \"raw\""
        ),
    }
}

pub async fn camera(config: &CellConfig, cancel: CancellationToken) -> Result<()> {
    let opener = match device_opener(&config.camera) {
        Ok(opener) => opener,
        Err(e) => {
            announce(&Readiness::Failed)?;
            return Err(e);
        }
    };
    let channel = FrameChannel::new(config.camera.clone(), opener, cancel);

    let handle = match channel.start().await {
        Ok(handle) => handle,
        Err(e) => {
            announce(&Readiness::Failed)?;
            error!("Camera process failed: {}", e);
            return Err(e.into());
        }
    };

    announce(&Readiness::Ready(handle.region_name().to_string()))?;
    handle.wait().await?;
    Ok(())
}

pub async fn coordinator(config: &CellConfig, reset: bool, cancel: CancellationToken) -> Result<()> {
    let store = store(config);
    if reset {
        store.reset().await?;
    }

    let engine = DecisionEngine::new(config.engine.depth);
    let mut coordinator = TurnCoordinator::new(store, engine, &config.coordinator);
    let status = coordinator.run(cancel).await?;
    println!("{}", status);
    Ok(())
}

pub async fn robot(config: &CellConfig, once: bool, cancel: CancellationToken) -> Result<()> {
    if once {
        let state = inspect(&config.robot).await?;
        println!(
            "{}: {}, {}: {}",
            config.robot.sync_var, state.sync, config.robot.select_var, state.selection
        );
        return Ok(());
    }

    let store = store(config);
    let mut source: Box<dyn MoveSource> = match config.robot.move_source {
        MoveSourceKind::Store => Box::new(StoreMoveSource::new(store)),
        MoveSourceKind::Engine => Box::new(EngineMoveSource::new(
            store,
            DecisionEngine::new(config.engine.depth),
        )),
    };
    info!(
        "Robot link to {} using {:?} moves",
        config.robot.address(),
        config.robot.move_source
    );
    run_link(&config.robot, source.as_mut(), cancel).await?;
    Ok(())
}

pub async fn reset(config: &CellConfig) -> Result<()> {
    let record = store(config).reset().await?;
    print_record(&record);
    Ok(())
}

pub async fn status(config: &CellConfig, json: bool) -> Result<()> {
    let store = store(config);
    let record = match store.try_read().await {
        Ok(record) => record,
        Err(e) => {
            warn!("{}", e);
            GameStateRecord::degraded()
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

pub async fn submit(config: &CellConfig, column: u8) -> Result<()> {
    let record = store(config)
        .submit_player_column(i32::from(column) - 1)
        .await?;
    print_record(&record);
    Ok(())
}

pub async fn absorb(config: &CellConfig, file: Option<&Path>, replace: bool) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    let cells = parse_grid(&text)?;
    let store = store(config);

    if replace {
        let record = store.replace_board(&cells).await?;
        print_record(&record);
        return Ok(());
    }

    match store.absorb_symbols(&cells).await? {
        Absorption::Unchanged => println!("Board unchanged"),
        Absorption::PlayerMove(column) => println!("Player move in column {}", column + 1),
        Absorption::Mismatch => {
            bail!("perceived board does not follow from the record; use --replace to resync")
        }
    }
    Ok(())
}

pub async fn stop(config: &CellConfig) -> Result<()> {
    store(config).request_stop().await?;
    println!("Stop requested");
    Ok(())
}

pub async fn play(config: &CellConfig, seed: Option<u64>) -> Result<()> {
    let mut engine = match seed {
        Some(seed) => DecisionEngine::seeded(config.engine.depth, seed),
        None => DecisionEngine::new(config.engine.depth),
    };
    let mut stdout = tokio::io::stdout();
    crate::play::play(BufReader::new(tokio::io::stdin()), &mut stdout, &mut engine).await?;
    Ok(())
}

fn column_label(column: i32) -> String {
    if column == NO_COLUMN {
        "-".to_string()
    } else {
        (column + 1).to_string()
    }
}

fn print_record(record: &GameStateRecord) {
    println!("status:          {} (revision {})", record.status, record.revision);
    println!("session:         {:016x}", record.session);
    println!("player column:   {}", column_label(record.player_column));
    println!("computer column: {}", column_label(record.computer_column));
    println!("moves:           {}", record.moves.len());
    if record.stop {
        println!("stop requested");
    }
    println!("{}", record.board_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> CellConfig {
        let mut config = CellConfig::default();
        config.store.path = dir.path().join("game_status.json");
        config
    }

    #[test]
    fn test_raw_backend_always_available() {
        let camera = CameraConfig {
            backend: CameraBackend::Raw,
            ..Default::default()
        };
        assert!(device_opener(&camera).is_ok());
    }

    #[test]
    fn test_column_label() {
        assert_eq!(column_label(NO_COLUMN), "-");
        assert_eq!(column_label(0), "1");
        assert_eq!(column_label(6), "7");
    }

    #[tokio::test]
    async fn test_operator_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        reset(&config).await.unwrap();
        submit(&config, 4).await.unwrap();

        let record = store(&config).read().await;
        assert_eq!(record.player_column, 3);

        stop(&config).await.unwrap();
        assert!(store(&config).read().await.stop);
    }

    #[tokio::test]
    async fn test_absorb_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        reset(&config).await.unwrap();

        let grid = dir.path().join("grid.txt");
        std::fs::write(&grid, ".......\n.......\n.......\n.......\n.......\n.X.....\n").unwrap();
        absorb(&config, Some(&grid), false).await.unwrap();
        assert_eq!(store(&config).read().await.player_column, 1);

        std::fs::write(&grid, ".......\n.......\n.......\n.......\n.O.....\n.X.....\n").unwrap();
        assert!(absorb(&config, Some(&grid), false).await.is_err());
        absorb(&config, Some(&grid), true).await.unwrap();
        assert_eq!(store(&config).read().await.board_state.piece_count(), 2);
    }
}
