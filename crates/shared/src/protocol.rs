use serde::{Deserialize, Serialize};

use crate::domain::{Board, GameId, PlayerId};

/// Body of `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

/// Response of `POST /register`. The server mints the id and echoes the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub player_id: PlayerId,
    pub name: String,
}

/// Response of `POST /join-queue?player_id=<id>`. Informational only; the
/// match itself arrives as a `game_state` push once an opponent is found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueResponse {
    pub status: String,
    pub message: String,
}

/// Full game snapshot as pushed by the server. The board always replaces the
/// previous one wholesale; the client keeps no board state of its own.
///
/// Only `id`, `player1`, and `board` are guaranteed; everything else is
/// optional so that minimal payloads parse, and unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub id: GameId,
    pub player1: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2: Option<PlayerId>,
    pub board: Board,
    #[serde(
        rename = "currentPlayer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_player: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    #[serde(rename = "isDraw", default)]
    pub is_draw: bool,
}

/// Server -> client channel messages, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirmation push sent right after the socket is accepted.
    Connected { player_id: PlayerId },
    GameState {
        data: GameState,
        #[serde(rename = "yourTurn", default)]
        your_turn: bool,
    },
    GameEnded { reason: String },
}

/// Client -> server channel messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move {
        game_id: GameId,
        row: usize,
        col: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Mark;

    #[test]
    fn parses_minimal_game_state_push() {
        let raw = r#"{
            "type": "game_state",
            "data": {
                "id": "g1",
                "player1": "p1",
                "board": [[null,null,null],[null,null,null],[null,null,null]]
            },
            "yourTurn": true
        }"#;

        let msg: ServerMessage = serde_json::from_str(raw).expect("parse");
        match msg {
            ServerMessage::GameState { data, your_turn } => {
                assert!(your_turn);
                assert_eq!(data.id, GameId::from("g1"));
                assert_eq!(data.player1, PlayerId::from("p1"));
                assert!(data.board.is_empty());
                assert!(data.winner.is_none());
                assert!(!data.is_draw);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_full_game_state_push_and_ignores_unknown_fields() {
        let raw = r#"{
            "type": "game_state",
            "data": {
                "id": "g1",
                "player1": "p1",
                "player2": "p2",
                "board": [["X",null,null],[null,"O",null],[null,null,null]],
                "currentPlayer": "p1",
                "winner": null,
                "isDraw": false,
                "marks": {"p1": "X", "p2": "O"}
            },
            "yourTurn": false
        }"#;

        let msg: ServerMessage = serde_json::from_str(raw).expect("parse");
        match msg {
            ServerMessage::GameState { data, your_turn } => {
                assert!(!your_turn);
                assert_eq!(data.player2, Some(PlayerId::from("p2")));
                assert_eq!(data.board.cell(0, 0), Some(Mark::X));
                assert_eq!(data.board.cell(1, 1), Some(Mark::O));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_connected_and_game_ended_pushes() {
        let connected: ServerMessage =
            serde_json::from_str(r#"{"type":"connected","player_id":"p1"}"#).expect("parse");
        assert!(matches!(connected, ServerMessage::Connected { player_id } if player_id == PlayerId::from("p1")));

        let ended: ServerMessage =
            serde_json::from_str(r#"{"type":"game_ended","reason":"Opponent disconnected"}"#)
                .expect("parse");
        assert!(matches!(ended, ServerMessage::GameEnded { reason } if reason == "Opponent disconnected"));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let result = serde_json::from_str::<ServerMessage>(r#"{"type":"rematch"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn move_message_serializes_with_flat_tag() {
        let msg = ClientMessage::Move {
            game_id: GameId::from("g1"),
            row: 1,
            col: 2,
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "move", "game_id": "g1", "row": 1, "col": 2})
        );
    }
}
