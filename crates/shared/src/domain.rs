use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

// Ids are minted by the server (UUID strings); the client treats them as opaque.
id_newtype!(PlayerId);
id_newtype!(GameId);

/// The symbol a player holds within one game. The server assigns `X` to the
/// designated first player (`player1`) and `O` to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// Mark derived from comparing the local player against the game's
    /// designated first player.
    pub fn for_player(local: &PlayerId, player1: &PlayerId) -> Self {
        if local == player1 {
            Mark::X
        } else {
            Mark::O
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => f.write_str("X"),
            Mark::O => f.write_str("O"),
        }
    }
}

pub const BOARD_SIZE: usize = 3;

/// A full 3x3 board snapshot. The wire shape is a 3x3 grid of `"X"`, `"O"`,
/// or `null`, which is exactly what the nested `Option<Mark>` array
/// serializes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board(pub [[Option<Mark>; BOARD_SIZE]; BOARD_SIZE]);

impl Board {
    pub fn cell(&self, row: usize, col: usize) -> Option<Mark> {
        self.0[row][col]
    }

    pub fn in_bounds(row: usize, col: usize) -> bool {
        row < BOARD_SIZE && col < BOARD_SIZE
    }

    /// All nine cells in row-major order, each paired with its coordinates.
    /// Render layers rely on this ordering and on the count being exactly 9.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Option<Mark>)> + '_ {
        self.0.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(move |(col, mark)| (row, col, *mark))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cells().all(|(_, _, mark)| mark.is_none())
    }
}
