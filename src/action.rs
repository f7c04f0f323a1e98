//! Agent commands: a closed tagged union of the three action variants.
//!
//! The serde shape is exactly the wire shape,
//! `{"action": "<variant>", "properties": {...}}`, so the same type serves
//! as the parser for incoming command batches and as the rendered form in
//! the persisted match log. Dispatch is by tag, which keeps the tick
//! resolution exhaustive over variants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvalidAction;
use crate::world::{Coord, UnitId, World};

/// A single agent command.
///
/// Parsing tolerates unknown extra properties; a teleport in particular may
/// carry a target, which is ignored — its effective target is always the
/// acting unit's own spawn cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "properties", rename_all = "lowercase")]
pub enum Action {
    /// Step to an adjacent cell (Chebyshev distance 1).
    Move {
        /// Acting unit.
        unit_id: UnitId,
        /// Target column.
        x: i32,
        /// Target row.
        y: i32,
    },
    /// Recall to the acting unit's spawn cell.
    Teleport {
        /// Acting unit.
        unit_id: UnitId,
    },
    /// Remove whatever occupies a cell within Chebyshev distance 2.
    Fire {
        /// Acting unit.
        unit_id: UnitId,
        /// Target column.
        x: i32,
        /// Target row.
        y: i32,
    },
}

impl Action {
    /// Parse one raw command record.
    ///
    /// # Errors
    /// [`InvalidAction::Malformed`] when the discriminator is missing or
    /// unrecognized, the properties record is absent or mis-shaped, or a
    /// field has the wrong type. The caller drops the command; parsing never
    /// aborts the batch.
    pub fn parse(raw: &Value) -> Result<Action, InvalidAction> {
        Ok(serde_json::from_value(raw.clone())?)
    }

    /// The acting unit.
    pub fn unit_id(&self) -> UnitId {
        match *self {
            Action::Move { unit_id, .. }
            | Action::Teleport { unit_id }
            | Action::Fire { unit_id, .. } => unit_id,
        }
    }

    /// True for the fire variant; everything else resolves in the move phase.
    pub fn is_fire(&self) -> bool {
        matches!(self, Action::Fire { .. })
    }

    /// The cell this action operates on. For a teleport that is the acting
    /// unit's spawn, so `None` is returned when the unit no longer exists.
    pub fn target(&self, world: &World) -> Option<Coord> {
        match *self {
            Action::Move { x, y, .. } | Action::Fire { x, y, .. } => Some(Coord::new(x, y)),
            Action::Teleport { unit_id } => world.unit(unit_id).map(|unit| unit.spawn),
        }
    }

    /// Validate this action against the current world.
    ///
    /// # Errors
    /// [`InvalidAction`] naming the violated contract: the unit must exist,
    /// move/fire targets must be in-bounds and within range of the unit's
    /// current cell. A teleport is always valid if the unit exists.
    pub fn validate(&self, world: &World) -> Result<(), InvalidAction> {
        match *self {
            Action::Move { unit_id, x, y } => {
                let unit = world
                    .unit(unit_id)
                    .ok_or(InvalidAction::UnknownUnit(unit_id))?;
                let target = Coord::new(x, y);
                if !world.contains(target) {
                    return Err(InvalidAction::MoveOutOfBounds);
                }
                if unit.position.chebyshev(target) > 1 {
                    return Err(InvalidAction::MoveOutOfRange);
                }
                Ok(())
            }
            Action::Teleport { unit_id } => {
                world
                    .unit(unit_id)
                    .ok_or(InvalidAction::UnknownUnit(unit_id))?;
                Ok(())
            }
            Action::Fire { unit_id, x, y } => {
                let unit = world
                    .unit(unit_id)
                    .ok_or(InvalidAction::UnknownUnit(unit_id))?;
                let target = Coord::new(x, y);
                if !world.contains(target) {
                    return Err(InvalidAction::FireOutOfBounds);
                }
                if unit.position.chebyshev(target) > 2 {
                    return Err(InvalidAction::FireOutOfRange);
                }
                Ok(())
            }
        }
    }
}
