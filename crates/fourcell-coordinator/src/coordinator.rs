//! Turn coordinator
//!
//! Polls the shared record and performs the transition owned by whichever
//! side is due to move. Every transition is one read, one in-memory mutation
//! and one commit.

use fourcell_core::{
    Actor, Board, CellError, CoordinatorConfig, GameStateRecord, Move, NO_COLUMN, Result, Status,
};
use fourcell_engine::DecisionEngine;
use fourcell_store::GameStateStore;
use rand::Rng;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a single coordinator step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to do this poll
    Idle,
    /// Record predates our own last write
    Stale,
    /// Record could not be read
    Degraded,
    /// A move was applied; the session continues in this status
    Advanced(Status),
    /// Session is over
    Finished(Status),
}

/// Apply `column` for `actor` and return the status that follows
pub fn apply_move(record: &mut GameStateRecord, column: usize, actor: Actor) -> Result<Status> {
    record.board_state.drop_piece(column, actor)?;
    record.moves.push(Move { actor, column });

    let status = outcome_after(&record.board_state, actor);
    record.status = status;
    Ok(status)
}

fn outcome_after(board: &Board, mover: Actor) -> Status {
    if board.has_won(mover) {
        Status::win_for(mover)
    } else if board.is_full() {
        Status::Tie
    } else {
        Status::wait_for(mover.other())
    }
}

/// Drives one session through the turn state machine
pub struct TurnCoordinator<R = StdRng> {
    store: GameStateStore,
    engine: DecisionEngine<R>,
    poll_interval: Duration,
    /// Session and revision of our last commit
    last_written: Option<(u64, u64)>,
    /// Session and revision whose invalid player column was already reported
    reported_invalid: Option<(u64, u64)>,
}

impl<R: Rng> TurnCoordinator<R> {
    pub fn new(store: GameStateStore, engine: DecisionEngine<R>, config: &CoordinatorConfig) -> Self {
        Self {
            store,
            engine,
            poll_interval: config.poll_interval(),
            last_written: None,
            reported_invalid: None,
        }
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    /// Perform at most one transition
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<Step> {
        let record = self.store.read().await;

        if record.is_degraded() {
            if cancel.is_cancelled() {
                warn!("Cancelled while the record is unreadable; leaving it untouched");
                return Ok(Step::Finished(Status::Stopped));
            }
            warn!("Game record unavailable, retrying in {:?}", self.poll_interval);
            return Ok(Step::Degraded);
        }

        // Revisions restart with every session; only compare within one
        match self.last_written {
            Some((session, last)) if session == record.session && record.revision < last => {
                debug!(
                    "Skipping stale record revision {} (last written {})",
                    record.revision, last
                );
                return Ok(Step::Stale);
            }
            Some((session, _)) if session != record.session => {
                info!("New session {:016x} detected", record.session);
                self.last_written = None;
            }
            _ => {}
        }

        if record.status.is_terminal() {
            return Ok(Step::Finished(record.status));
        }

        if record.stop || cancel.is_cancelled() {
            let mut record = record;
            record.status = Status::Stopped;
            self.commit(record).await?;
            info!("Session stopped");
            return Ok(Step::Finished(Status::Stopped));
        }

        match record.status {
            Status::PlayerWait => self.player_turn(record).await,
            Status::ComputerWait => self.computer_turn(record).await,
            _ => Ok(Step::Idle),
        }
    }

    async fn player_turn(&mut self, mut record: GameStateRecord) -> Result<Step> {
        if !record.has_pending_player_column() {
            return Ok(Step::Idle);
        }

        let column = match record.board_state.validate_column(record.player_column) {
            Ok(column) => column,
            Err(e) => {
                let key = (record.session, record.revision);
                if self.reported_invalid != Some(key) {
                    warn!(
                        "Ignoring player column {} at revision {}: {}",
                        record.player_column, record.revision, e
                    );
                    self.reported_invalid = Some(key);
                }
                return Ok(Step::Idle);
            }
        };

        let status = apply_move(&mut record, column, Actor::Player)?;
        record.player_column = NO_COLUMN;
        self.commit(record).await?;
        info!("Player dropped in column {} -> {}", column + 1, status);
        Ok(Self::settle(status))
    }

    async fn computer_turn(&mut self, mut record: GameStateRecord) -> Result<Step> {
        let column = match self.engine.choose_column(&record.board_state) {
            Ok(column) => column,
            Err(CellError::NoLegalMoves) => {
                warn!("Computer to move on a full board; declaring a tie");
                record.status = Status::Tie;
                self.commit(record).await?;
                return Ok(Step::Finished(Status::Tie));
            }
            Err(e) => return Err(e),
        };

        let status = apply_move(&mut record, column, Actor::Computer)?;
        record.computer_column = column as i32;
        self.commit(record).await?;
        info!("Computer dropped in column {} -> {}", column + 1, status);
        Ok(Self::settle(status))
    }

    async fn commit(&mut self, record: GameStateRecord) -> Result<()> {
        let written = self.store.commit(record).await?;
        self.last_written = Some((written.session, written.revision));
        Ok(())
    }

    fn settle(status: Status) -> Step {
        if status.is_terminal() {
            Step::Finished(status)
        } else {
            Step::Advanced(status)
        }
    }

    /// Poll until the session ends or `cancel` fires; returns the final status
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<Status> {
        info!(
            "Turn coordinator started on {} (poll {:?}, depth {})",
            self.store.path().display(),
            self.poll_interval,
            self.engine.depth()
        );

        loop {
            match self.step(&cancel).await {
                Ok(Step::Finished(status)) => {
                    info!("Session finished: {}", status);
                    return Ok(status);
                }
                // Apply consecutive transitions without waiting
                Ok(Step::Advanced(_)) if !cancel.is_cancelled() => continue,
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Coordinator step failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => debug!("Coordinator cancellation requested"),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourcell_core::COLS;

    fn coordinator(dir: &tempfile::TempDir) -> TurnCoordinator {
        let store = GameStateStore::new(dir.path().join("game_status.json"));
        let config = CoordinatorConfig {
            poll_interval_ms: 10,
        };
        TurnCoordinator::new(store, DecisionEngine::seeded(4, 11), &config)
    }

    #[test]
    fn test_apply_move_outcomes() {
        let mut record = GameStateRecord::default();
        assert_eq!(
            apply_move(&mut record, 0, Actor::Player).unwrap(),
            Status::ComputerWait
        );
        assert_eq!(record.moves, vec![Move { actor: Actor::Player, column: 0 }]);

        for _ in 0..3 {
            apply_move(&mut record, 6, Actor::Computer).unwrap();
        }
        assert_eq!(
            apply_move(&mut record, 6, Actor::Computer).unwrap(),
            Status::ComputerWin
        );
    }

    #[test]
    fn test_full_board_without_winner_is_tie() {
        // Pairs of rows alternate owner and shift by column parity, so no
        // line of four forms anywhere.
        let pattern = |row: usize, col: usize| {
            if (row / 2 + col) % 2 == 0 {
                Actor::Player
            } else {
                Actor::Computer
            }
        };
        let mut record = GameStateRecord::default();
        for col in 0..COLS {
            for row in 0..6 {
                if (col, row) != (COLS - 1, 5) {
                    record.board_state.drop_piece(col, pattern(row, col)).unwrap();
                }
            }
        }
        let last = pattern(5, COLS - 1);
        assert_eq!(apply_move(&mut record, COLS - 1, last).unwrap(), Status::Tie);
    }

    #[tokio::test]
    async fn test_idle_without_pending_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        coord.store().reset().await.unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(coord.step(&cancel).await.unwrap(), Step::Idle);
        assert_eq!(coord.store().read().await.revision, 0);
    }

    #[tokio::test]
    async fn test_player_then_computer() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        store.reset().await.unwrap();
        store.submit_player_column(3).await.unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(
            coord.step(&cancel).await.unwrap(),
            Step::Advanced(Status::ComputerWait)
        );
        let record = store.read().await;
        assert_eq!(record.player_column, NO_COLUMN);
        assert_eq!(record.moves.len(), 1);
        assert_eq!(record.revision, 2);

        assert_eq!(
            coord.step(&cancel).await.unwrap(),
            Step::Advanced(Status::PlayerWait)
        );
        let record = store.read().await;
        assert_eq!(record.moves.len(), 2);
        assert_eq!(record.board_state.piece_count(), 2);
        let last = record.last_move().unwrap();
        assert_eq!(last.actor, Actor::Computer);
        assert_eq!(record.computer_column, last.column as i32);
        assert_eq!(record.revision, 3);
    }

    #[tokio::test]
    async fn test_invalid_column_leaves_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        let mut record = GameStateRecord::default();
        for _ in 0..6 {
            record.board_state.drop_piece(2, Actor::Computer).unwrap();
        }
        record.player_column = 2;
        store.write(&record).await.unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(coord.step(&cancel).await.unwrap(), Step::Idle);
        assert_eq!(coord.step(&cancel).await.unwrap(), Step::Idle);
        assert_eq!(coord.reported_invalid, Some((0, 0)));
        assert_eq!(store.read().await, record);
    }

    #[tokio::test]
    async fn test_computer_completes_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        let mut record = GameStateRecord {
            status: Status::ComputerWait,
            ..Default::default()
        };
        for col in 0..3 {
            record.board_state.drop_piece(col, Actor::Computer).unwrap();
        }
        record.board_state.drop_piece(6, Actor::Player).unwrap();
        record.board_state.drop_piece(6, Actor::Player).unwrap();
        record.board_state.drop_piece(5, Actor::Player).unwrap();
        store.write(&record).await.unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(
            coord.step(&cancel).await.unwrap(),
            Step::Finished(Status::ComputerWin)
        );
        let record = store.read().await;
        assert_eq!(record.status, Status::ComputerWin);
        assert_eq!(record.computer_column, 3);
    }

    #[tokio::test]
    async fn test_stop_flag_writes_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        store.reset().await.unwrap();
        store.request_stop().await.unwrap();

        let status = coord.run(CancellationToken::new()).await.unwrap();
        assert_eq!(status, Status::Stopped);
        assert_eq!(store.read().await.status, Status::Stopped);
    }

    #[tokio::test]
    async fn test_cancellation_writes_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        store.reset().await.unwrap();

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { coord.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap().unwrap(), Status::Stopped);
        assert_eq!(store.read().await.status, Status::Stopped);
    }

    #[tokio::test]
    async fn test_stale_revision_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        let record = GameStateRecord {
            revision: 5,
            player_column: 1,
            ..Default::default()
        };
        store.write(&record).await.unwrap();

        let cancel = CancellationToken::new();
        coord.step(&cancel).await.unwrap();
        assert_eq!(coord.last_written, Some((0, 6)));

        let older = GameStateRecord {
            revision: 4,
            player_column: 2,
            ..Default::default()
        };
        store.write(&older).await.unwrap();
        assert_eq!(coord.step(&cancel).await.unwrap(), Step::Stale);
        assert_eq!(store.read().await, older);
    }

    #[tokio::test]
    async fn test_reset_and_submit_between_polls() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let store = coord.store().clone();
        store.reset().await.unwrap();
        let cancel = CancellationToken::new();

        for column in [0, 1, 2] {
            store.submit_player_column(column).await.unwrap();
            coord.step(&cancel).await.unwrap();
            coord.step(&cancel).await.unwrap();
        }
        let (_, last) = coord.last_written.unwrap();
        assert!(last > 1);

        // The new session is only seen once it has already moved past revision 0
        let fresh = store.reset().await.unwrap();
        store.submit_player_column(3).await.unwrap();

        assert_eq!(
            coord.step(&cancel).await.unwrap(),
            Step::Advanced(Status::ComputerWait)
        );
        let record = store.read().await;
        assert_eq!(record.session, fresh.session);
        assert_eq!(record.moves, vec![Move { actor: Actor::Player, column: 3 }]);
        assert_eq!(record.player_column, NO_COLUMN);
        assert_eq!(record.revision, 2);
    }

    #[tokio::test]
    async fn test_degraded_read_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let cancel = CancellationToken::new();
        assert_eq!(coord.step(&cancel).await.unwrap(), Step::Degraded);
    }

    #[tokio::test]
    async fn test_terminal_record_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut coord = coordinator(&dir);
        let record = GameStateRecord {
            status: Status::PlayerWin,
            ..Default::default()
        };
        coord.store().write(&record).await.unwrap();
        let status = coord.run(CancellationToken::new()).await.unwrap();
        assert_eq!(status, Status::PlayerWin);
    }
}
