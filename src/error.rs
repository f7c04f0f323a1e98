//! Typed errors for match setup and command handling.

use thiserror::Error;

/// Rejection of a map/roster record at match construction.
///
/// Fatal to match startup only: no world is ever built from an invalid
/// setup, and a running match can never produce one of these.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The map declares no teams.
    #[error("\"teams\" must not be empty")]
    NoTeams,

    /// No team brought any unit.
    #[error("roster contains no units")]
    NoUnits,

    /// Zero-width or zero-height grid.
    #[error("map dimensions must be positive")]
    EmptyGrid,

    /// The same unit id appears twice in the roster.
    #[error("unit id {0} is not unique")]
    DuplicateUnitId(u32),

    /// Two units share a spawn cell.
    #[error("spawn position ({x}, {y}) is not unique")]
    DuplicateSpawn {
        /// Column of the offending spawn.
        x: i32,
        /// Row of the offending spawn.
        y: i32,
    },

    /// A spawn cell lies outside the grid.
    #[error("spawn position ({x}, {y}) is outside the game field")]
    SpawnOutOfBounds {
        /// Column of the offending spawn.
        x: i32,
        /// Row of the offending spawn.
        y: i32,
    },

    /// Two units share an initial position.
    #[error("unit position ({x}, {y}) is not unique")]
    DuplicatePosition {
        /// Column of the offending position.
        x: i32,
        /// Row of the offending position.
        y: i32,
    },

    /// An initial position lies outside the grid.
    #[error("unit position ({x}, {y}) is outside the game field")]
    PositionOutOfBounds {
        /// Column of the offending position.
        x: i32,
        /// Row of the offending position.
        y: i32,
    },
}

/// Rejection of a single agent command.
///
/// Never fatal: the command is dropped and the round continues.
#[derive(Debug, Error)]
pub enum InvalidAction {
    /// The record had no recognizable action discriminator or its
    /// properties did not match the variant's shape.
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The referenced unit does not exist (any more).
    #[error("non-existent unit {0}")]
    UnknownUnit(u32),

    /// Move target outside the grid.
    #[error("move outside the map")]
    MoveOutOfBounds,

    /// Move target further than one cell away.
    #[error("out of range move")]
    MoveOutOfRange,

    /// Fire target outside the grid.
    #[error("fire outside the map")]
    FireOutOfBounds,

    /// Fire target further than two cells away.
    #[error("out of range fire")]
    FireOutOfRange,
}
