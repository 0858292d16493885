//! Terminal game against the engine

use anyhow::Result;
use fourcell_coordinator::apply_move;
use fourcell_core::{Actor, COLS, GameStateRecord, Status};
use fourcell_engine::DecisionEngine;
use rand::Rng;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Play one game on the terminal; the human moves first.
///
/// Returns the final status, or `Stopped` if input ends mid-game.
pub async fn play<R, W, G>(input: R, output: &mut W, engine: &mut DecisionEngine<G>) -> Result<Status>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    G: Rng,
{
    let mut lines = input.lines();
    let mut record = GameStateRecord::default();

    loop {
        output
            .write_all(format!("{}\n", record.board_state).as_bytes())
            .await?;

        let status = match record.status {
            Status::PlayerWait => {
                output
                    .write_all(b"Player (X), choose a column (1-7): ")
                    .await?;
                output.flush().await?;

                let Some(line) = lines.next_line().await? else {
                    output.write_all(b"\n").await?;
                    return Ok(Status::Stopped);
                };
                let column = match line.trim().parse::<i32>() {
                    Ok(n) => record.board_state.validate_column(n.saturating_sub(1)),
                    Err(_) => {
                        output
                            .write_all(format!("Please enter a number between 1 and {}.\n", COLS).as_bytes())
                            .await?;
                        continue;
                    }
                };
                match column {
                    Ok(column) => apply_move(&mut record, column, Actor::Player)?,
                    Err(_) => {
                        output.write_all(b"Invalid move! Try again.\n").await?;
                        continue;
                    }
                }
            }
            Status::ComputerWait => {
                let column = engine.choose_column(&record.board_state)?;
                output
                    .write_all(format!("Computer (O) drops in column {}\n", column + 1).as_bytes())
                    .await?;
                apply_move(&mut record, column, Actor::Computer)?
            }
            status => status,
        };

        let verdict = match status {
            Status::PlayerWin => "Player wins!",
            Status::ComputerWin => "Computer wins!",
            Status::Tie => "It's a tie!",
            _ => continue,
        };
        output
            .write_all(format!("{}\n{}\n", record.board_state, verdict).as_bytes())
            .await?;
        output.flush().await?;
        return Ok(status);
    }
}
