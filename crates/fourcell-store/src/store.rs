//! File-backed game record shared between processes
//!
//! Writers publish through a temporary file in the same directory followed by
//! a rename, so a reader sees either the old record or the new one in full.

use crate::codec::{decode, encode};
use fourcell_core::{
    Actor, Board, CellError, GameStateRecord, NO_COLUMN, Result, Status, StoreConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Distinguishes temporary files of concurrent writes within one process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// What a perception update meant for the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorption {
    /// Physical board matches the record
    Unchanged,
    /// One new player piece was seen; its column is now pending
    PlayerMove(usize),
    /// Physical board cannot be reached from the record by one player move
    Mismatch,
}

/// Handle to the shared record file
#[derive(Debug, Clone)]
pub struct GameStateStore {
    path: PathBuf,
}

impl GameStateStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured location
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone())
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the default record under a fresh session id
    pub async fn reset(&self) -> Result<GameStateRecord> {
        let record = GameStateRecord {
            session: rand::random(),
            ..Default::default()
        };
        self.write(&record).await?;
        info!(
            "Game record reset at {} (session {:016x})",
            self.path.display(),
            record.session
        );
        Ok(record)
    }

    /// Read the record, degrading to an `Error` snapshot when it cannot be trusted
    pub async fn read(&self) -> GameStateRecord {
        match self.try_read().await {
            Ok(record) => record,
            Err(CellError::Corrupted(reason)) => {
                error!(
                    "Game record at {} is corrupted, operator attention needed: {}",
                    self.path.display(),
                    reason
                );
                GameStateRecord::degraded()
            }
            Err(e) => {
                warn!("Game record at {} unreadable: {}", self.path.display(), e);
                GameStateRecord::degraded()
            }
        }
    }

    /// Read the record, reporting why it could not be used
    pub async fn try_read(&self) -> Result<GameStateRecord> {
        let bytes = fs::read(&self.path).await.map_err(|e| {
            CellError::IpcError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        decode(&bytes)
    }

    /// Persist `record` exactly as given
    pub async fn write(&self, record: &GameStateRecord) -> Result<()> {
        let bytes = encode(record)?;
        let tmp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                CellError::IpcError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            CellError::IpcError(format!("Failed to create {}: {}", tmp.display(), e))
        })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| CellError::IpcError(format!("Failed to write record: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| CellError::IpcError(format!("Failed to sync record: {}", e)))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CellError::IpcError(format!(
                "Failed to publish record to {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(
            "Wrote record revision {} status {}",
            record.revision, record.status
        );
        Ok(())
    }

    /// Bump the revision and write; returns what was written
    pub async fn commit(&self, mut record: GameStateRecord) -> Result<GameStateRecord> {
        record.revision += 1;
        self.write(&record).await?;
        Ok(record)
    }

    /// Report the human's column. The only field the console writes.
    pub async fn submit_player_column(&self, column: i32) -> Result<GameStateRecord> {
        let mut record = self.try_read().await?;
        if record.status != Status::PlayerWait {
            return Err(CellError::OutOfTurn(format!(
                "player move submitted while status is {}",
                record.status
            )));
        }
        record.board_state.validate_column(column)?;

        record.player_column = column;
        let record = self.commit(record).await?;
        info!("Player column {} submitted (revision {})", column, record.revision);
        Ok(record)
    }

    /// Ask every process to end the session
    pub async fn request_stop(&self) -> Result<GameStateRecord> {
        let mut record = self.try_read().await?;
        record.stop = true;
        let record = self.commit(record).await?;
        info!("Stop requested (revision {})", record.revision);
        Ok(record)
    }

    /// Take a perception grid (image order, top row first) and derive the
    /// human's move from it.
    pub async fn absorb_symbols<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Absorption> {
        let observed = Board::from_symbols(symbols)?;
        let mut record = self.try_read().await?;

        if record.status != Status::PlayerWait {
            return Err(CellError::OutOfTurn(format!(
                "perception update while status is {}",
                record.status
            )));
        }

        match classify(&record.board_state, &observed) {
            Absorption::PlayerMove(column) => {
                if record.player_column == column as i32 {
                    return Ok(Absorption::PlayerMove(column));
                }
                record.player_column = column as i32;
                let record = self.commit(record).await?;
                info!(
                    "Perception saw player move in column {} (revision {})",
                    column, record.revision
                );
                Ok(Absorption::PlayerMove(column))
            }
            Absorption::Unchanged => Ok(Absorption::Unchanged),
            Absorption::Mismatch => {
                warn!(
                    "Perceived board does not follow from the record:\nrecord:\n{}\nobserved:\n{}",
                    record.board_state, observed
                );
                Ok(Absorption::Mismatch)
            }
        }
    }

    /// Overwrite the board with a perceived one, discarding pending columns.
    /// Recovery path for when the physical board and the record diverge.
    pub async fn replace_board<S: AsRef<str>>(&self, symbols: &[S]) -> Result<GameStateRecord> {
        let observed = Board::from_symbols(symbols)?;
        let mut record = self.try_read().await?;
        record.board_state = observed;
        record.player_column = NO_COLUMN;
        let record = self.commit(record).await?;
        warn!("Board replaced from perception (revision {})", record.revision);
        Ok(record)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".into());
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
    }
}

/// Compare the record board with a perceived one
fn classify(current: &Board, observed: &Board) -> Absorption {
    if current == observed {
        return Absorption::Unchanged;
    }

    current
        .legal_columns()
        .into_iter()
        .find(|&col| {
            current
                .with_piece(col, Actor::Player)
                .is_ok_and(|next| next == *observed)
        })
        .map(Absorption::PlayerMove)
        .unwrap_or(Absorption::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourcell_core::{CELL_COUNT, COLS, Cell, Move, ROWS};
    use proptest::prelude::*;

    fn store_in(dir: &tempfile::TempDir) -> GameStateStore {
        GameStateStore::new(dir.path().join("processing").join("game_status.json"))
    }

    fn symbols_for(board: &Board) -> Vec<String> {
        let mut out = Vec::with_capacity(CELL_COUNT);
        for row in (0..ROWS).rev() {
            for col in 0..COLS {
                out.push(
                    match board.get(row, col) {
                        Cell::Empty => "",
                        Cell::Player => "X",
                        Cell::Computer => "O",
                    }
                    .to_string(),
                );
            }
        }
        out
    }

    #[tokio::test]
    async fn test_reset_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();

        let record = store.read().await;
        assert_eq!(
            record,
            GameStateRecord {
                session: record.session,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_reset_starts_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let first = store.reset().await.unwrap();
        let second = store.reset().await.unwrap();
        assert_ne!(first.session, second.session);
        assert_eq!(second.revision, 0);
    }

    #[tokio::test]
    async fn test_missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = store.read().await;
        assert_eq!(record.status, Status::Error);
        assert_eq!(record.board_state, Board::new());
    }

    #[tokio::test]
    async fn test_corrupted_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();
        tokio::fs::write(store.path(), b"{\"checksum\": \"ab\", \"record\": ")
            .await
            .unwrap();

        assert!(store.read().await.is_degraded());
        assert!(matches!(
            store.try_read().await,
            Err(CellError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_bumps_revision() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = store.reset().await.unwrap();
        let committed = store.commit(record).await.unwrap();
        assert_eq!(committed.revision, 1);
        assert_eq!(store.read().await.revision, 1);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();

        let parent = store.path().parent().unwrap();
        let names: Vec<String> = std::fs::read_dir(parent)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["game_status.json".to_string()]);
    }

    #[test]
    fn test_temp_paths_unique_per_write() {
        let store = GameStateStore::new("/tmp/fourcell/game_status.json");
        let first = store.temp_path();
        let second = store.temp_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), store.path().parent());
    }

    #[tokio::test]
    async fn test_concurrent_writes_publish_whole_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();

        let writers: Vec<_> = (0..8u64)
            .map(|revision| {
                let store = store.clone();
                tokio::spawn(async move {
                    let record = GameStateRecord {
                        revision,
                        ..Default::default()
                    };
                    store.write(&record).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let record = store.try_read().await.unwrap();
        assert!(record.revision < 8);
        let leftovers = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_submit_player_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();

        let record = store.submit_player_column(4).await.unwrap();
        assert_eq!(record.player_column, 4);
        assert_eq!(record.revision, 1);

        assert!(matches!(
            store.submit_player_column(9).await,
            Err(CellError::ColumnOutOfRange(9))
        ));
        assert_eq!(store.read().await.player_column, 4);
    }

    #[tokio::test]
    async fn test_submit_out_of_turn_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = GameStateRecord {
            status: Status::ComputerWait,
            ..Default::default()
        };
        store.write(&record).await.unwrap();

        assert!(matches!(
            store.submit_player_column(2).await,
            Err(CellError::OutOfTurn(_))
        ));
        assert_eq!(store.read().await, record);
    }

    #[tokio::test]
    async fn test_request_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();
        let record = store.request_stop().await.unwrap();
        assert!(record.stop);
        assert!(store.read().await.stop);
    }

    #[tokio::test]
    async fn test_absorb_detects_player_move() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut record = GameStateRecord::default();
        record.board_state.drop_piece(3, Actor::Player).unwrap();
        record.board_state.drop_piece(3, Actor::Computer).unwrap();
        store.write(&record).await.unwrap();

        let unchanged = symbols_for(&record.board_state);
        assert_eq!(
            store.absorb_symbols(&unchanged).await.unwrap(),
            Absorption::Unchanged
        );

        let moved = record.board_state.with_piece(5, Actor::Player).unwrap();
        assert_eq!(
            store.absorb_symbols(&symbols_for(&moved)).await.unwrap(),
            Absorption::PlayerMove(5)
        );
        let after = store.read().await;
        assert_eq!(after.player_column, 5);
        assert_eq!(after.revision, 1);
        // the coordinator applies the move, not perception
        assert_eq!(after.board_state, record.board_state);

        // a repeated observation does not write again
        store.absorb_symbols(&symbols_for(&moved)).await.unwrap();
        assert_eq!(store.read().await.revision, 1);

        let jumped = moved.with_piece(0, Actor::Player).unwrap();
        assert_eq!(
            store.absorb_symbols(&symbols_for(&jumped)).await.unwrap(),
            Absorption::Mismatch
        );
    }

    #[tokio::test]
    async fn test_replace_board() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.reset().await.unwrap();

        let mut board = Board::new();
        board.drop_piece(0, Actor::Computer).unwrap();
        board.drop_piece(0, Actor::Player).unwrap();
        let record = store.replace_board(&symbols_for(&board)).await.unwrap();
        assert_eq!(record.board_state, board);
        assert_eq!(store.read().await.board_state, board);
    }

    fn arb_record() -> impl Strategy<Value = GameStateRecord> {
        let status = prop_oneof![
            Just(Status::PlayerWait),
            Just(Status::ComputerWait),
            Just(Status::PlayerWin),
            Just(Status::ComputerWin),
            Just(Status::Tie),
            Just(Status::Stopped),
            Just(Status::Error),
        ];
        (
            any::<u64>(),
            any::<u64>(),
            -1i32..7,
            -1i32..7,
            status,
            any::<bool>(),
            prop::collection::vec(0..COLS, 0..42),
        )
            .prop_map(|(session, revision, player_column, computer_column, status, stop, columns)| {
                let mut board = Board::new();
                let mut moves = Vec::new();
                let mut actor = Actor::Player;
                for column in columns {
                    if board.drop_piece(column, actor).is_ok() {
                        moves.push(Move { actor, column });
                        actor = actor.other();
                    }
                }
                GameStateRecord {
                    session,
                    revision,
                    player_column,
                    computer_column,
                    status,
                    stop,
                    moves,
                    board_state: board,
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_write_then_read_is_identity(record in arb_record()) {
            let dir = tempfile::tempdir().unwrap();
            let store = store_in(&dir);
            let read_back = tokio_test::block_on(async {
                store.write(&record).await.unwrap();
                store.try_read().await.unwrap()
            });
            prop_assert_eq!(read_back, record);
        }
    }
}
