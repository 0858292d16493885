//! Move handshake with the controller
//!
//! The controller owns an acknowledgement counter and a selection variable.
//! An odd counter with an empty selection means the arm is waiting for the
//! automated player's column: we write the column, then bump the counter to
//! hand control back.

use crate::client::EkiClient;
use async_trait::async_trait;
use fourcell_core::{Actor, CellError, Result, RobotConfig};
use fourcell_engine::DecisionEngine;
use fourcell_store::GameStateStore;
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Selection value meaning "no column selected"
pub const NO_SELECTION: i64 = -1;

/// Supplies the column the arm should play
#[async_trait]
pub trait MoveSource: Send {
    /// Next column to execute, `None` if there is nothing to play yet.
    ///
    /// The same column keeps being offered until [`MoveSource::confirm`].
    async fn next_column(&mut self) -> Result<Option<usize>>;

    /// The column last offered reached the controller
    fn confirm(&mut self) {}
}

/// Session id and log position of one computer move
type MoveKey = (u64, usize);

/// Columns the turn coordinator committed for the automated side
pub struct StoreMoveSource {
    store: GameStateStore,
    /// Last computer move the controller accepted
    consumed: Option<MoveKey>,
    /// Move offered by the last `next_column`
    offered: Option<MoveKey>,
}

impl StoreMoveSource {
    pub fn new(store: GameStateStore) -> Self {
        Self {
            store,
            consumed: None,
            offered: None,
        }
    }
}

#[async_trait]
impl MoveSource for StoreMoveSource {
    async fn next_column(&mut self) -> Result<Option<usize>> {
        self.offered = None;
        let record = self.store.read().await;
        if record.is_degraded() {
            return Ok(None);
        }

        let Some(position) = record
            .moves
            .iter()
            .rposition(|m| m.actor == Actor::Computer)
        else {
            return Ok(None);
        };
        let key = (record.session, position);
        if self.consumed == Some(key) {
            return Ok(None);
        }

        self.offered = Some(key);
        Ok(Some(record.moves[position].column))
    }

    fn confirm(&mut self) {
        if let Some(key) = self.offered.take() {
            self.consumed = Some(key);
        }
    }
}

/// Searches the store's current board directly
pub struct EngineMoveSource<R> {
    store: GameStateStore,
    engine: DecisionEngine<R>,
}

impl<R: Rng> EngineMoveSource<R> {
    pub fn new(store: GameStateStore, engine: DecisionEngine<R>) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl<R: Rng + Send> MoveSource for EngineMoveSource<R> {
    async fn next_column(&mut self) -> Result<Option<usize>> {
        let record = self.store.read().await;
        if record.is_degraded() || record.status.is_terminal() {
            return Ok(None);
        }
        match self.engine.choose_column(&record.board_state) {
            Ok(column) => Ok(Some(column)),
            Err(CellError::NoLegalMoves) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Handshake variable values seen in one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeState {
    pub sync: i64,
    pub selection: i64,
}

impl HandshakeState {
    /// Whether the controller is waiting for a column
    pub fn awaiting_move(&self) -> bool {
        self.sync.rem_euclid(2) == 1 && self.selection == NO_SELECTION
    }
}

/// Outcome of one handshake poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Controller is not waiting for us
    Idle(HandshakeState),
    /// Controller is waiting but no column is available yet
    Waiting(HandshakeState),
    /// Column written and counter advanced
    Executed { column: usize, sync: i64 },
}

/// Read both handshake variables
pub async fn read_state(client: &mut EkiClient, config: &RobotConfig) -> Result<HandshakeState> {
    let sync = client.read_variable(&config.sync_var).await?.int_value(0);
    let selection = client
        .read_variable(&config.select_var)
        .await?
        .int_value(NO_SELECTION);
    Ok(HandshakeState { sync, selection })
}

/// One poll of the handshake
pub async fn poll_once(
    client: &mut EkiClient,
    config: &RobotConfig,
    source: &mut dyn MoveSource,
) -> Result<HandshakeStep> {
    let state = read_state(client, config).await?;
    debug!("{}: {}, {}: {}", config.sync_var, state.sync, config.select_var, state.selection);

    if !state.awaiting_move() {
        return Ok(HandshakeStep::Idle(state));
    }

    let Some(column) = source.next_column().await? else {
        return Ok(HandshakeStep::Waiting(state));
    };

    info!("Computer operation detected, sending column {}", column + 1);
    client
        .write_variable(&config.select_var, &column.to_string())
        .await?;
    let sync = state.sync + 1;
    client
        .write_variable(&config.sync_var, &sync.to_string())
        .await?;
    source.confirm();
    Ok(HandshakeStep::Executed { column, sync })
}

/// Connect, read the handshake variables once and log them
pub async fn inspect(config: &RobotConfig) -> Result<HandshakeState> {
    let mut client = EkiClient::new(config);
    client.connect_with_retry().await?;
    let state = read_state(&mut client, config).await;
    client.close().await;

    let state = state?;
    info!(
        "{}: {}, {}: {}",
        config.sync_var, state.sync, config.select_var, state.selection
    );
    Ok(state)
}

/// Poll the handshake until cancelled.
///
/// Session errors close the socket and reconnect under the retry policy;
/// exhausting the retries ends the loop with the error.
pub async fn run_link(
    config: &RobotConfig,
    source: &mut dyn MoveSource,
    cancel: CancellationToken,
) -> Result<()> {
    let mut client = EkiClient::new(config);

    let result = loop {
        if !client.is_connected() {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                connected = client.connect_with_retry() => connected,
            };
            if let Err(e) = connected {
                break Err(e);
            }
        }

        let step = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            step = poll_once(&mut client, config, source) => step,
        };
        match step {
            Ok(HandshakeStep::Executed { column, sync }) => {
                info!("Column {} handed to controller (sync {})", column + 1, sync)
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Controller session failed, reconnecting: {}", e);
                client.close().await;
                continue;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            _ = sleep(config.poll_interval()) => {}
        }
    };

    client.close().await;
    info!("Robot link stopped");
    result
}
