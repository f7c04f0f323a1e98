//! Wire messages exchanged with agents, one JSON document per line.
//!
//! Framing is identical whether the peer is a spawned subprocess (stdio) or
//! a TCP socket: every message is a single line of serialized JSON,
//! terminated by `\n`. The same action shape is reused for the persisted
//! match log, so a log can be replayed exactly (see [`crate::replay`]).
//!
//! # Example Session
//!
//! ```text
//! <- {"my_team_id":0,"map_width":10,"map_height":10,"units":[{"id":0,"spawn_x":0,"spawn_y":0,"team":0},...]}
//! <- {"tick":0,"units":[{"id":0,"x":0,"y":0},{"id":1,"x":9,"y":9}]}
//! -> [{"action":"move","properties":{"unit_id":0,"x":1,"y":1}}]
//! <- {"tick":1,"units":[{"id":0,"x":1,"y":1},{"id":1,"x":9,"y":9}]}
//! -> [{"action":"fire","properties":{"unit_id":0,"x":2,"y":2}}]
//! ```

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// One-time per-team map description, sent before the first round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    /// The team this agent plays.
    pub my_team_id: usize,
    /// Grid width in cells.
    pub map_width: u32,
    /// Grid height in cells.
    pub map_height: u32,
    /// Full roster: every unit of every team, with its spawn cell.
    pub units: Vec<UnitSetup>,
}

/// Roster entry inside a [`Handshake`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Unit id, unique across the match.
    pub id: u32,
    /// Spawn cell column.
    pub spawn_x: i32,
    /// Spawn cell row.
    pub spawn_y: i32,
    /// Owning team index.
    pub team: usize,
}

/// Per-round state broadcast. Only live units are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    /// Completed tick count.
    pub tick: u32,
    /// Position of every live unit.
    pub units: Vec<UnitSnapshot>,
}

/// Position of one live unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit id.
    pub id: u32,
    /// Current column.
    pub x: i32,
    /// Current row.
    pub y: i32,
}

/// One persisted log entry per completed tick: the post-tick unit snapshot
/// and every action that took visible effect, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Live units after the tick.
    pub units: Vec<UnitSnapshot>,
    /// Applied moves and teleports, then effective fires.
    pub actions: Vec<Action>,
}
