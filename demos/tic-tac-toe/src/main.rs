//! Tic-tac-toe on one table device with two phones as players.
//!
//! The table hosts the session in the `TABLE` role and owns the game;
//! each player device joins as a client and places a mark whenever the
//! table says it's their turn. Everything runs in one process over the
//! in-memory transport.

use nearplay::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

const SERVICE: &str = "nearplay.tic-tac-toe";

// Resource ids the devices resolve into localized text.
const RES_WAITING_FOR_PLAYERS: u32 = 1;
const RES_TURN: u32 = 2;
const RES_WINS: u32 = 3;
const RES_DRAW: u32 = 4;
const RES_PLAYER_LEFT: u32 = 5;

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Cell {
    Empty,
    X,
    O,
}

/// Game-specific tags for client → table payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum GameTag {
    PlaceMark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Move {
    row: usize,
    col: usize,
}

/// What the table broadcasts after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Board {
    cells: [[Cell; 3]; 3],
    next: Option<EndpointId>,
    over: bool,
    message: ResourceText,
}

// ---------------------------------------------------------------------------
// Game logic (table side)
// ---------------------------------------------------------------------------

struct Game {
    board: [[Cell; 3]; 3],
    players: Vec<PlayerState>,
    turn: usize, // index into players: 0 = X, 1 = O
    outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Winner(String),
    Draw,
    Abandoned(String),
}

impl Game {
    fn new() -> Self {
        Self {
            board: [[Cell::Empty; 3]; 3],
            players: Vec::new(),
            turn: 0,
            outcome: None,
        }
    }

    fn is_ready(&self) -> bool {
        self.players.len() == 2
    }

    /// Seats a player. Returns `false` once both seats are taken.
    fn join(&mut self, player: PlayerState) -> bool {
        if self.is_ready() || self.players.iter().any(|p| p.id == player.id) {
            return false;
        }
        self.players.push(player);
        true
    }

    fn leave(&mut self, id: &EndpointId) {
        let Some(index) = self.players.iter().position(|p| &p.id == id) else {
            return;
        };
        let player = self.players.remove(index);
        if self.outcome.is_none() {
            self.outcome = Some(Outcome::Abandoned(player.nickname));
        }
    }

    fn validate(&self, sender: &EndpointId, mv: Move) -> Result<(), String> {
        if self.outcome.is_some() {
            return Err("game is over".into());
        }
        if !self.is_ready() {
            return Err("waiting for players".into());
        }
        if &self.players[self.turn].id != sender {
            return Err("not your turn".into());
        }
        if mv.row >= 3 || mv.col >= 3 {
            return Err("row and col must be 0-2".into());
        }
        if self.board[mv.row][mv.col] != Cell::Empty {
            return Err("cell is occupied".into());
        }
        Ok(())
    }

    fn apply(&mut self, sender: &EndpointId, mv: Move) -> Result<(), String> {
        self.validate(sender, mv)?;
        let mark = if self.turn == 0 { Cell::X } else { Cell::O };
        self.board[mv.row][mv.col] = mark;

        if check_winner(&self.board, mark) {
            self.outcome = Some(Outcome::Winner(self.players[self.turn].nickname.clone()));
        } else if board_full(&self.board) {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.turn = 1 - self.turn;
        }
        Ok(())
    }

    fn snapshot(&self) -> Board {
        let message = match (&self.outcome, self.is_ready()) {
            (Some(Outcome::Winner(name)), _) => ResourceText::StringResource {
                res_id: RES_WINS,
                args: vec![name.clone().into()],
            },
            (Some(Outcome::Draw), _) => ResourceText::StringResource {
                res_id: RES_DRAW,
                args: Vec::new(),
            },
            (Some(Outcome::Abandoned(name)), _) => ResourceText::StringResource {
                res_id: RES_PLAYER_LEFT,
                args: vec![name.clone().into()],
            },
            (None, true) => ResourceText::StringResource {
                res_id: RES_TURN,
                args: vec![self.players[self.turn].nickname.clone().into()],
            },
            (None, false) => ResourceText::PluralResource {
                res_id: RES_WAITING_FOR_PLAYERS,
                quantity: (2 - self.players.len()) as u32,
                args: Vec::new(),
            },
        };
        let next = (self.outcome.is_none() && self.is_ready())
            .then(|| self.players[self.turn].id.clone());
        Board {
            cells: self.board,
            next,
            over: self.outcome.is_some(),
            message,
        }
    }
}

fn check_winner(b: &[[Cell; 3]; 3], m: Cell) -> bool {
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m))           // rows
    || (0..3).any(|j| (0..3).all(|i| b[i][j] == m))        // cols
    || (0..3).all(|i| b[i][i] == m)                         // diagonal
    || (0..3).all(|i| b[i][2 - i] == m)                     // anti-diagonal
}

fn board_full(b: &[[Cell; 3]; 3]) -> bool {
    b.iter().all(|row| row.iter().all(|c| *c != Cell::Empty))
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

struct Table {
    server: ServerManager<MemoryTransport>,
    events: EventReceiver,
    actions: mpsc::UnboundedReceiver<ClientAction>,
    game: Game,
}

impl Table {
    async fn open(network: &MemoryNetwork) -> Self {
        let (transport, events) = network.join().await;
        let (tx, actions) = mpsc::unbounded_channel();
        let mut server = ServerManager::new(transport, move |action| {
            let _ = tx.send(action);
        });
        server
            .start_server(
                SERVICE,
                ServerConfiguration {
                    role: ServerRole::Table,
                    max_connections: 2,
                    display_name: "table".into(),
                    ..ServerConfiguration::default()
                },
            )
            .await;
        Self {
            server,
            events,
            actions,
            game: Game::new(),
        }
    }

    /// Handles queued transport events and game actions. Returns how
    /// many things happened.
    async fn step(&mut self) -> Result<usize, NearplayError> {
        let mut handled = self.server.pump(&mut self.events).await;
        while let Ok(action) = self.actions.try_recv() {
            handled += 1;
            if self.on_action(action).await? {
                self.server
                    .broadcast_envelope(
                        &ServerPayloadType::UpdateGameState,
                        Some(&self.game.snapshot()),
                        None,
                    )
                    .await?;
            }
        }
        Ok(handled)
    }

    /// Applies one client action. Returns `true` if the board changed.
    async fn on_action(&mut self, action: ClientAction) -> Result<bool, NearplayError> {
        match action {
            ClientAction::EstablishConnection(id, bytes) => {
                if !self.server.state().is_connected(&id) {
                    tracing::debug!(%id, "introduction from a turned-away device");
                    return Ok(false);
                }
                let envelope = decode::<ClientPayloadType, PlayerConnectionState>(&bytes, None)?;
                let Some(identity) = envelope.body else {
                    return Ok(false);
                };
                tracing::info!(%id, nickname = %identity.nickname, "player seated");
                let seated = self.game.join(PlayerState::from_connection(id, identity));
                if self.game.is_ready() {
                    self.server.stop_advertising().await;
                }
                Ok(seated)
            }
            ClientAction::PayloadAction(id, bytes) => {
                let envelope = match decode::<GameTag, Move>(&bytes, None) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(%id, error = %e, "unknown payload");
                        return Ok(false);
                    }
                };
                let (GameTag::PlaceMark, Some(mv)) = envelope.into_parts() else {
                    return Ok(false);
                };
                match self.game.apply(&id, mv) {
                    Ok(()) => {
                        tracing::info!(%id, row = mv.row, col = mv.col, "mark placed");
                        Ok(true)
                    }
                    Err(reason) => {
                        tracing::warn!(%id, %reason, "move refused");
                        Ok(false)
                    }
                }
            }
            ClientAction::Disconnect(id) => {
                self.game.leave(&id);
                Ok(true)
            }
        }
    }
}

struct Phone {
    client: ClientManager<MemoryTransport>,
    events: EventReceiver,
    actions: mpsc::UnboundedReceiver<ServerAction>,
    last_board: Option<Board>,
}

impl Phone {
    async fn join(network: &MemoryNetwork, nickname: &str) -> Self {
        let (transport, events) = network.join().await;
        let (tx, actions) = mpsc::unbounded_channel();
        let mut client = ClientManager::new(transport, move |action| {
            let _ = tx.send(action);
        });
        client
            .connect(SERVICE, PlayerConnectionState::new(nickname, None))
            .await;
        Self {
            client,
            events,
            actions,
            last_board: None,
        }
    }

    async fn step(&mut self) -> Result<usize, NearplayError> {
        let mut handled = self.client.pump(&mut self.events).await;
        while let Ok(action) = self.actions.try_recv() {
            handled += 1;
            let ServerAction::UpdateGameState(bytes) = action else {
                continue;
            };
            let Some(board) = decode::<ServerPayloadType, Board>(&bytes, None)?.body else {
                continue;
            };
            let me = self.client.transport().local_endpoint();
            if board.next.as_ref() == Some(me) {
                if let Some(mv) = first_empty(&board.cells) {
                    self.client
                        .send_envelope(&GameTag::PlaceMark, Some(&mv), None)
                        .await?;
                }
            }
            self.last_board = Some(board);
        }
        Ok(handled)
    }
}

fn first_empty(cells: &[[Cell; 3]; 3]) -> Option<Move> {
    (0..3)
        .flat_map(|row| (0..3).map(move |col| Move { row, col }))
        .find(|mv| cells[mv.row][mv.col] == Cell::Empty)
}

/// Runs a whole game and returns the final board as the table saw it.
async fn play(network: &MemoryNetwork) -> Result<Board, NearplayError> {
    let mut table = Table::open(network).await;
    let mut ann = Phone::join(network, "Ann").await;
    let mut bo = Phone::join(network, "Bo").await;

    loop {
        let handled = table.step().await? + ann.step().await? + bo.step().await?;
        if handled == 0 {
            break;
        }
    }

    table.server.close_server().await;
    Ok(table.game.snapshot())
}

fn render(cells: &[[Cell; 3]; 3]) -> String {
    cells
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Cell::Empty => ".",
                    Cell::X => "X",
                    Cell::O => "O",
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::main]
async fn main() -> Result<(), NearplayError> {
    init_tracing("info");

    let network = MemoryNetwork::new();
    let board = play(&network).await?;

    println!("{}", render(&board.cells));
    println!("{}", serde_json::to_string(&board.message).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seated() -> Game {
        let mut game = Game::new();
        game.join(PlayerState::from_connection(
            "x".into(),
            PlayerConnectionState::new("Ann", None),
        ));
        game.join(PlayerState::from_connection(
            "o".into(),
            PlayerConnectionState::new("Bo", None),
        ));
        game
    }

    #[test]
    fn test_move_out_of_turn_is_refused() {
        let mut game = seated();
        let result = game.apply(&"o".into(), Move { row: 0, col: 0 });
        assert_eq!(result, Err("not your turn".into()));
    }

    #[test]
    fn test_occupied_cell_is_refused() {
        let mut game = seated();
        game.apply(&"x".into(), Move { row: 1, col: 1 }).unwrap();
        let result = game.apply(&"o".into(), Move { row: 1, col: 1 });
        assert_eq!(result, Err("cell is occupied".into()));
    }

    #[test]
    fn test_third_player_is_not_seated() {
        let mut game = seated();
        let seated = game.join(PlayerState::from_connection(
            "z".into(),
            PlayerConnectionState::new("Cy", None),
        ));
        assert!(!seated);
    }

    #[test]
    fn test_x_wins_top_row() {
        let mut game = seated();
        for (who, row, col) in [("x", 0, 0), ("o", 1, 0), ("x", 0, 1), ("o", 1, 1), ("x", 0, 2)] {
            game.apply(&who.into(), Move { row, col }).unwrap();
        }
        let board = game.snapshot();
        assert!(board.over);
        assert_eq!(board.next, None);
        assert_eq!(
            board.message,
            ResourceText::StringResource {
                res_id: RES_WINS,
                args: vec!["Ann".into()],
            }
        );
    }

    #[test]
    fn test_leaving_mid_game_abandons_it() {
        let mut game = seated();
        game.leave(&"o".into());
        assert_eq!(game.outcome, Some(Outcome::Abandoned("Bo".into())));
    }

    #[tokio::test]
    async fn test_full_game_over_memory_network() {
        let network = MemoryNetwork::new();

        let board = play(&network).await.unwrap();

        // Both players take the first free cell, so X completes the
        // anti-diagonal on the seventh move.
        assert!(board.over);
        assert_eq!(board.cells[0][2], Cell::X);
        assert_eq!(board.cells[1][1], Cell::X);
        assert_eq!(board.cells[2][0], Cell::X);
        assert!(matches!(
            board.message,
            ResourceText::StringResource { res_id: RES_WINS, .. }
        ));
    }
}
