//! Session controller for the matchmade tic-tac-toe client.
//!
//! [`MatchClient`] owns all per-session mutable state and mediates between
//! three event sources (the one-shot registration flow, inbound channel
//! pushes, and cell selections from a frontend) and two outputs (outbound
//! channel messages and broadcast [`ClientEvent`]s ready to render).

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use shared::{
    domain::{Board, GameId, Mark, PlayerId},
    error::ApiError,
    protocol::{
        ClientMessage, GameState, JoinQueueResponse, RegisterRequest, RegisterResponse,
        ServerMessage,
    },
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Lifecycle of one session. `Ended` is transient: the controller resets
/// back to `Unregistered` immediately after announcing the ended game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unregistered,
    Queued,
    InGame,
    Ended,
}

/// Turn status derived fresh from each `game_state` push, never stored.
/// A winner takes precedence over the draw flag, which takes precedence
/// over whose-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Won,
    Lost,
    Draw,
    YourTurn,
    OpponentTurn,
}

impl TurnStatus {
    pub fn derive(state: &GameState, your_turn: bool, local: &PlayerId) -> Self {
        if let Some(winner) = &state.winner {
            if winner == local {
                TurnStatus::Won
            } else {
                TurnStatus::Lost
            }
        } else if state.is_draw {
            TurnStatus::Draw
        } else if your_turn {
            TurnStatus::YourTurn
        } else {
            TurnStatus::OpponentTurn
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStatus::Won | TurnStatus::Lost | TurnStatus::Draw)
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Won => f.write_str("Game over: You won!"),
            TurnStatus::Lost => f.write_str("Game over: Opponent won!"),
            TurnStatus::Draw => f.write_str("Game over: Draw!"),
            TurnStatus::YourTurn => f.write_str("Your turn"),
            TurnStatus::OpponentTurn => f.write_str("Opponent's turn"),
        }
    }
}

/// Everything a frontend needs to render one frame of the game screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub game_id: GameId,
    pub mark: Mark,
    pub status: TurnStatus,
    pub board: Board,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    PhaseChanged(Phase),
    GameUpdated(GameView),
    GameEnded { reason: String },
    Error(String),
}

/// Locally recoverable session errors. Transport failures are surfaced as
/// `anyhow` errors carrying the server's detail where one was provided.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("player name must not be empty")]
    EmptyName,
    #[error("cell ({row}, {col}) is outside the 3x3 board")]
    CellOutOfRange { row: usize, col: usize },
    #[error("server url must start with http:// or https://")]
    UnsupportedScheme,
}

#[derive(Debug, Clone)]
struct ActiveGame {
    game_id: GameId,
    // Derived once per game id from the first snapshot, never reassigned.
    mark: Mark,
}

struct SessionState {
    server_url: Option<String>,
    player_id: Option<PlayerId>,
    phase: Phase,
    game: Option<ActiveGame>,
    board: Board,
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
    ws_started: bool,
    // Identifies which spawned channel the current outbound/ws_started
    // belong to; 0 means none.
    channel_epoch: u64,
}

impl SessionState {
    fn fresh() -> Self {
        Self {
            server_url: None,
            player_id: None,
            phase: Phase::Unregistered,
            game: None,
            board: Board::default(),
            outbound: None,
            ws_started: false,
            channel_epoch: 0,
        }
    }
}

pub struct MatchClient {
    http: Client,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ClientEvent>,
    // Monotonic across resets so a stale reader can never match a reused
    // epoch value.
    channel_seq: AtomicU64,
}

impl MatchClient {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            http: Client::new(),
            inner: Mutex::new(SessionState::fresh()),
            events,
            channel_seq: AtomicU64::new(0),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub async fn player_id(&self) -> Option<PlayerId> {
        self.inner.lock().await.player_id.clone()
    }

    /// Drive the session from `Unregistered` to `Queued`: register the name,
    /// join the matchmaking queue, and open the push channel.
    ///
    /// A retained player id from a previous attempt means registration
    /// succeeded but a later step failed; the retry resumes at queue-join
    /// instead of re-registering.
    pub async fn register_and_queue(
        self: &Arc<Self>,
        server_url: &str,
        name: &str,
    ) -> Result<PlayerId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName.into());
        }
        let server_url = normalize_server_url(server_url)?;

        let retained = {
            let mut guard = self.inner.lock().await;
            guard.server_url = Some(server_url.clone());
            guard.player_id.clone()
        };

        let player_id = match retained {
            Some(id) => {
                info!(player_id = %id, "reusing registered id; retrying queue-join");
                id
            }
            None => {
                let id = self.register(&server_url, name).await?;
                self.inner.lock().await.player_id = Some(id.clone());
                id
            }
        };

        self.join_queue(&server_url, &player_id).await?;

        let ws_started = { self.inner.lock().await.ws_started };
        if !ws_started {
            self.spawn_channel(&server_url, &player_id).await?;
        }

        self.inner.lock().await.phase = Phase::Queued;
        let _ = self.events.send(ClientEvent::PhaseChanged(Phase::Queued));
        Ok(player_id)
    }

    /// Send a move intent for the selected cell. A no-op when no game is
    /// active or the channel is down; the board is never updated locally,
    /// so the next `game_state` push reflects the move or its rejection.
    pub async fn play_cell(&self, row: usize, col: usize) -> Result<()> {
        if !Board::in_bounds(row, col) {
            return Err(SessionError::CellOutOfRange { row, col }.into());
        }

        let guard = self.inner.lock().await;
        let (Some(game), Some(outbound)) = (&guard.game, &guard.outbound) else {
            debug!(row, col, "cell selected with no active game; ignoring");
            return Ok(());
        };

        let message = ClientMessage::Move {
            game_id: game.game_id.clone(),
            row,
            col,
        };
        outbound
            .send(message)
            .map_err(|_| anyhow!("channel writer is gone"))?;
        Ok(())
    }

    /// Explicit replacement for the original's page reload: discard all
    /// session state and close the channel by dropping its writer.
    pub async fn reset(&self) {
        {
            let mut guard = self.inner.lock().await;
            *guard = SessionState::fresh();
        }
        let _ = self
            .events
            .send(ClientEvent::PhaseChanged(Phase::Unregistered));
    }

    async fn register(&self, server_url: &str, name: &str) -> Result<PlayerId> {
        let response = self
            .http
            .post(format!("{server_url}/register"))
            .json(&RegisterRequest {
                name: name.to_string(),
            })
            .send()
            .await
            .context("registration request failed")?;
        let response = check_api_error(response).await?;
        let body: RegisterResponse = response
            .json()
            .await
            .context("invalid registration response")?;
        info!(player_id = %body.player_id, name = %body.name, "registered");
        Ok(body.player_id)
    }

    async fn join_queue(&self, server_url: &str, player_id: &PlayerId) -> Result<()> {
        let response = self
            .http
            .post(format!("{server_url}/join-queue"))
            .query(&[("player_id", player_id.0.as_str())])
            .send()
            .await
            .context("queue-join request failed")?;
        let response = check_api_error(response).await?;

        // No payload contract beyond success; the body is informational.
        if let Ok(body) = response.json::<JoinQueueResponse>().await {
            debug!(status = %body.status, message = %body.message, "queue joined");
        }
        Ok(())
    }

    async fn spawn_channel(self: &Arc<Self>, server_url: &str, player_id: &PlayerId) -> Result<()> {
        let ws_base = if let Some(rest) = server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(SessionError::UnsupportedScheme.into());
        };
        let ws_url = format!("{ws_base}/ws/{player_id}");

        let (stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect channel: {ws_url}"))?;
        info!(%ws_url, "channel open");
        let (mut writer, mut reader) = stream.split();

        let epoch = self.channel_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        {
            let mut guard = self.inner.lock().await;
            guard.outbound = Some(tx);
            guard.ws_started = true;
            guard.channel_epoch = epoch;
        }

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        error!(%err, "failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(err) = writer.send(Message::Text(text)).await {
                    warn!(%err, "channel send failed");
                    break;
                }
            }
            let _ = writer.send(Message::Close(None)).await;
        });

        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(msg) = reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => client.handle_server_message(message).await,
                        Err(err) => {
                            let _ = client
                                .events
                                .send(ClientEvent::Error(format!("invalid server message: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let _ = client
                            .events
                            .send(ClientEvent::Error(format!("channel receive failed: {err}")));
                        break;
                    }
                }
            }
            // No reconnection; a retry policy would live outside this state
            // machine.
            client.release_channel(epoch).await;
            info!("channel reader stopped");
        });

        Ok(())
    }

    /// Clear channel state when a reader stops, but only while it still
    /// belongs to that reader. A reset followed by a re-registration can
    /// install a newer channel before the old reader unblocks from its
    /// close handshake; that reader must not wipe the replacement.
    async fn release_channel(&self, epoch: u64) {
        let mut guard = self.inner.lock().await;
        if guard.channel_epoch == epoch {
            guard.ws_started = false;
            guard.outbound = None;
        }
    }

    async fn handle_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Connected { player_id } => {
                info!(%player_id, "channel confirmed by server");
            }
            ServerMessage::GameState { data, your_turn } => {
                self.apply_game_state(data, your_turn).await;
            }
            ServerMessage::GameEnded { reason } => self.finish_game(reason).await,
        }
    }

    async fn apply_game_state(&self, data: GameState, your_turn: bool) {
        let (phase_changed, view) = {
            let mut guard = self.inner.lock().await;
            let Some(player_id) = guard.player_id.clone() else {
                warn!(game_id = %data.id, "game state received before registration; dropping");
                return;
            };

            let mark = match &guard.game {
                Some(game) if game.game_id == data.id => game.mark,
                _ => {
                    let mark = Mark::for_player(&player_id, &data.player1);
                    guard.game = Some(ActiveGame {
                        game_id: data.id.clone(),
                        mark,
                    });
                    mark
                }
            };

            // Full snapshot replacement; the client holds no authoritative
            // board state of its own.
            guard.board = data.board.clone();

            let status = TurnStatus::derive(&data, your_turn, &player_id);
            let phase_changed = guard.phase != Phase::InGame;
            guard.phase = Phase::InGame;

            (
                phase_changed,
                GameView {
                    game_id: data.id,
                    mark,
                    status,
                    board: data.board,
                },
            )
        };

        if phase_changed {
            let _ = self.events.send(ClientEvent::PhaseChanged(Phase::InGame));
        }
        let _ = self.events.send(ClientEvent::GameUpdated(view));
    }

    async fn finish_game(&self, reason: String) {
        self.inner.lock().await.phase = Phase::Ended;
        info!(%reason, "game ended");
        let _ = self.events.send(ClientEvent::GameEnded { reason });
        self.reset().await;
    }
}

fn normalize_server_url(raw: &str) -> Result<String> {
    let raw = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(raw).context("invalid server url")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SessionError::UnsupportedScheme.into());
    }
    Ok(raw.to_string())
}

async fn check_api_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .json::<ApiError>()
        .await
        .map(|err| err.detail)
        .unwrap_or_else(|_| format!("server returned {status}"));
    Err(anyhow!(detail))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
