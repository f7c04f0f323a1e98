//! The authoritative match state: grid, units, teams and the match log.
//!
//! A [`World`] is built exactly once per match from a validated roster and is
//! then mutated only by the tick engine, one transition per round. The
//! per-tick log grows by one [`TickRecord`] per completed tick and is never
//! rewritten; it is the replay record of the match.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;

use crate::config::{MapConfig, UnitConfig};
use crate::error::SetupError;
use crate::protocol::{Handshake, RoundState, TickRecord, UnitSetup, UnitSnapshot};

/// Unit identity, unique across a match, assigned at setup.
pub type UnitId = u32;

/// Team identity: an index into the roster supplied at setup.
pub type TeamId = usize;

/// A grid cell coordinate.
///
/// Commands may name cells outside the grid; bounds are checked during
/// action validation, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Build a coordinate.
    pub const fn new(x: i32, y: i32) -> Coord {
        Coord { x, y }
    }

    /// Maximum of the per-axis deltas. Governs move and fire range.
    pub fn chebyshev(self, other: Coord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Sum of the per-axis deltas. Governs the spawn-kill radius.
    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One combat unit. Identity is the key it is stored under in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Owning team, immutable for the unit's lifetime.
    pub team: TeamId,
    /// Spawn cell, immutable; teleport recalls here.
    pub spawn: Coord,
    /// Current cell; written only by the tick engine.
    pub position: Coord,
}

/// The match world. See the module docs for the mutation discipline.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    width: u32,
    height: u32,
    units: BTreeMap<UnitId, Unit>,
    ticks: u32,
    remaining_teams: BTreeSet<TeamId>,
    log: Vec<TickRecord>,
}

impl World {
    /// Build a world from a team roster, validating every setup invariant.
    ///
    /// Unit ids must be unique; spawn cells must be unique and in-bounds;
    /// initial positions (defaulting to the spawn) must be unique and
    /// in-bounds, though a position may overlap another unit's spawn cell.
    ///
    /// # Errors
    /// The first violated invariant, as a [`SetupError`]. No partially
    /// constructed world is ever returned.
    pub fn new(width: u32, height: u32, teams: &[Vec<UnitConfig>]) -> Result<World, SetupError> {
        if width == 0 || height == 0 {
            return Err(SetupError::EmptyGrid);
        }
        if teams.is_empty() {
            return Err(SetupError::NoTeams);
        }

        let mut units = BTreeMap::new();
        let mut spawn_cells = BTreeSet::new();
        let mut unit_cells = BTreeSet::new();

        for (team, roster) in teams.iter().enumerate() {
            for desc in roster {
                if units.contains_key(&desc.id) {
                    return Err(SetupError::DuplicateUnitId(desc.id));
                }

                let spawn = Coord::new(desc.spawn_x, desc.spawn_y);
                if !inside(width, height, spawn) {
                    return Err(SetupError::SpawnOutOfBounds { x: spawn.x, y: spawn.y });
                }
                if !spawn_cells.insert(spawn) {
                    return Err(SetupError::DuplicateSpawn { x: spawn.x, y: spawn.y });
                }

                let position = match (desc.position_x, desc.position_y) {
                    (Some(x), Some(y)) => Coord::new(x, y),
                    _ => spawn,
                };
                if !inside(width, height, position) {
                    return Err(SetupError::PositionOutOfBounds { x: position.x, y: position.y });
                }
                if !unit_cells.insert(position) {
                    return Err(SetupError::DuplicatePosition { x: position.x, y: position.y });
                }

                units.insert(desc.id, Unit { team, spawn, position });
            }
        }

        if units.is_empty() {
            return Err(SetupError::NoUnits);
        }

        let remaining_teams = units.values().map(|unit| unit.team).collect();
        Ok(World {
            width,
            height,
            units,
            ticks: 0,
            remaining_teams,
            log: Vec::new(),
        })
    }

    /// Build a world from a loaded map file.
    ///
    /// # Errors
    /// Same contract as [`World::new`].
    pub fn from_config(config: &MapConfig) -> Result<World, SetupError> {
        World::new(config.map_width, config.map_height, &config.teams)
    }

    /// Grid width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// True if `cell` lies inside the grid.
    pub fn contains(&self, cell: Coord) -> bool {
        inside(self.width, self.height, cell)
    }

    /// Completed tick count.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// All live units, keyed by id.
    pub fn units(&self) -> &BTreeMap<UnitId, Unit> {
        &self.units
    }

    /// Look up a live unit.
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    pub(crate) fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Remove the unit occupying `cell`, if any. At most one unit can occupy
    /// a cell once the move phase has resolved.
    pub(crate) fn remove_unit_at(&mut self, cell: Coord) -> Option<UnitId> {
        let id = self
            .units
            .iter()
            .find(|(_, unit)| unit.position == cell)
            .map(|(&id, _)| id)?;
        self.units.remove(&id);
        Some(id)
    }

    /// Teams still represented among live units.
    pub fn remaining_teams(&self) -> &BTreeSet<TeamId> {
        &self.remaining_teams
    }

    pub(crate) fn refresh_remaining_teams(&mut self) {
        self.remaining_teams = self.units.values().map(|unit| unit.team).collect();
    }

    /// Append one tick's record and advance the tick counter.
    pub(crate) fn record_tick(&mut self, record: TickRecord) {
        self.log.push(record);
        self.ticks += 1;
    }

    /// Match-end predicate. Always false here: termination is driven by the
    /// match loop (channel exhaustion or the tick cap), but the hook lets a
    /// variant ruleset end a match early without touching the loop.
    pub fn is_ended(&self) -> bool {
        false
    }

    /// Teams holding the maximal live unit count (several on a tie, empty if
    /// no unit survived).
    pub fn winners(&self) -> Vec<TeamId> {
        let mut sizes: BTreeMap<TeamId, usize> = BTreeMap::new();
        for unit in self.units.values() {
            *sizes.entry(unit.team).or_default() += 1;
        }

        let best = sizes.values().copied().max().unwrap_or(0);
        sizes
            .into_iter()
            .filter(|&(_, count)| count == best)
            .map(|(team, _)| team)
            .collect()
    }

    /// The one-time map description sent to `team` before the first round.
    pub fn handshake(&self, team: TeamId) -> Handshake {
        Handshake {
            my_team_id: team,
            map_width: self.width,
            map_height: self.height,
            units: self
                .units
                .iter()
                .map(|(&id, unit)| UnitSetup {
                    id,
                    spawn_x: unit.spawn.x,
                    spawn_y: unit.spawn.y,
                    team: unit.team,
                })
                .collect(),
        }
    }

    /// The per-round broadcast: tick count and live unit positions.
    pub fn round_state(&self) -> RoundState {
        RoundState {
            tick: self.ticks,
            units: self
                .units
                .iter()
                .map(|(&id, unit)| UnitSnapshot {
                    id,
                    x: unit.position.x,
                    y: unit.position.y,
                })
                .collect(),
        }
    }

    /// The append-only per-tick log.
    pub fn log(&self) -> &[TickRecord] {
        &self.log
    }

    /// Persist the match log as JSON.
    ///
    /// # Errors
    /// I/O errors creating or writing the file.
    pub fn save_log(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("could not create log file {}", path.as_ref().display()))?;
        serde_json::to_writer(BufWriter::new(file), &self.log)
            .context("could not serialize match log")?;
        Ok(())
    }
}

impl fmt::Display for World {
    /// ASCII board: `X<id>` marks a spawn, `<team><id>` a unit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut field =
            vec![vec!["-".to_string(); self.width as usize]; self.height as usize];
        for (id, unit) in &self.units {
            field[unit.spawn.y as usize][unit.spawn.x as usize] = format!("X{id}");
            field[unit.position.y as usize][unit.position.x as usize] =
                format!("{}{}", unit.team, id);
        }

        for (row_index, row) in field.iter().enumerate() {
            if row_index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

fn inside(width: u32, height: u32, cell: Coord) -> bool {
    cell.x >= 0 && cell.y >= 0 && cell.x < width as i32 && cell.y < height as i32
}
