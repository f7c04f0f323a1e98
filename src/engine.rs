//! The tick state machine: one world transition per round.
//!
//! [`run_tick`] turns the raw per-team command batches of one round into
//! exactly one new world state and one log record, through ordered stages:
//!
//! 1. parse every raw command and authorize it against its submitting team;
//! 2. partition the survivors into move-actions (moves and teleports) and
//!    fire-actions;
//! 3. resolve move conflicts — every move whose target cell is claimed by
//!    more than one mover is cancelled, and a surviving move is skipped when
//!    its target is held by a unit staying put (two movers may still swap
//!    cells);
//! 4. spawn-kill elimination, in one simultaneous pass over the post-move
//!    positions;
//! 5. discard fire-actions of units eliminated in stage 4;
//! 6. resolve the remaining fires in submission-stable order, each removing
//!    the occupant of its target cell if one is (still) there;
//! 7. recompute the set of teams represented among survivors;
//! 8. append the log record and advance the tick counter.
//!
//! Every stage is a pure function of the world and the stage inputs; nothing
//! here suspends or performs I/O, so the caller can hold the world across
//! the whole transition.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::trace;

use crate::action::Action;
use crate::protocol::TickRecord;
use crate::world::{Coord, TeamId, UnitId, World};

/// Raw commands gathered for one round, keyed by submitting team. Teams
/// that submitted nothing are simply absent.
pub type TeamCommands = BTreeMap<TeamId, Vec<Value>>;

/// Advance `world` by exactly one tick.
pub fn run_tick(world: &mut World, commands: &TeamCommands) {
    let actions = authorize(world, commands);
    let (moves, fires) = split_actions(world, actions);

    let mut applied = resolve_moves(world, moves);

    let dead = spawn_kills(world);
    // dead units can't fire
    let fires: Vec<Action> = fires
        .into_iter()
        .filter(|action| !dead.contains(&action.unit_id()))
        .collect();
    applied.extend(resolve_fires(world, fires));

    world.refresh_remaining_teams();

    let units = world.round_state().units;
    world.record_tick(TickRecord { units, actions: applied });
}

/// Stage 1: parse each raw command, drop malformed records, drop commands
/// for missing or foreign units, drop out-of-contract targets.
fn authorize(world: &World, commands: &TeamCommands) -> Vec<Action> {
    let mut valid = Vec::new();
    for (&team, batch) in commands {
        for raw in batch {
            let action = match Action::parse(raw) {
                Ok(action) => action,
                Err(error) => {
                    trace!(team, %error, "dropped command");
                    continue;
                }
            };

            // agents may only act for units of their own team
            match world.unit(action.unit_id()) {
                Some(unit) if unit.team == team => {}
                _ => {
                    trace!(team, unit = action.unit_id(), "unauthorized command");
                    continue;
                }
            }

            if let Err(error) = action.validate(world) {
                trace!(team, %error, "invalid action");
                continue;
            }
            valid.push(action);
        }
    }
    valid
}

/// A move-phase intent with its resolved destination: the submitted target
/// for a move, the unit's spawn for a teleport.
struct MoveIntent {
    action: Action,
    target: Coord,
}

/// Stage 2: split validated actions into move-phase intents and fires.
fn split_actions(world: &World, actions: Vec<Action>) -> (Vec<MoveIntent>, Vec<Action>) {
    let mut moves = Vec::new();
    let mut fires = Vec::new();
    for action in actions {
        if action.is_fire() {
            fires.push(action);
        } else if let Some(target) = action.target(world) {
            moves.push(MoveIntent { action, target });
        }
    }
    (moves, fires)
}

/// Stage 3: cancel every move whose target cell is claimed more than once,
/// then apply the rest unless the target is held by a unit staying put.
/// Returns the moves that took effect.
fn resolve_moves(world: &mut World, moves: Vec<MoveIntent>) -> Vec<Action> {
    let mut claims: BTreeMap<Coord, Vec<MoveIntent>> = BTreeMap::new();
    for intent in moves {
        claims.entry(intent.target).or_default().push(intent);
    }
    let uncontested: Vec<MoveIntent> = claims
        .into_values()
        .filter(|claimants| claimants.len() == 1)
        .flatten()
        .collect();

    // cells of everyone not moving this tick block incoming movers;
    // cells of movers do not, which is what permits a swap
    let movers: BTreeSet<UnitId> = uncontested
        .iter()
        .map(|intent| intent.action.unit_id())
        .collect();
    let busy: BTreeSet<Coord> = world
        .units()
        .iter()
        .filter(|(id, _)| !movers.contains(*id))
        .map(|(_, unit)| unit.position)
        .collect();

    let mut applied = Vec::new();
    for intent in uncontested {
        if busy.contains(&intent.target) {
            continue; // occupied by a unit staying put; the mover holds still
        }
        if let Some(unit) = world.unit_mut(intent.action.unit_id()) {
            unit.position = intent.target;
            applied.push(intent.action);
        }
    }
    applied
}

/// Stage 4: one simultaneous pass over the post-move positions. A unit
/// standing within Manhattan distance 1 of the spawn of any unit of a
/// different team is removed; all removals land together, so a unit can be
/// eliminated and still cause an elimination in the same pass.
fn spawn_kills(world: &mut World) -> BTreeSet<UnitId> {
    let mut dead = BTreeSet::new();
    for (&id, unit) in world.units() {
        for other in world.units().values() {
            if other.team == unit.team {
                continue;
            }
            if unit.position.manhattan(other.spawn) <= 1 {
                dead.insert(id);
                break;
            }
        }
    }

    for &id in &dead {
        trace!(unit = id, "spawn kill");
        world.remove_unit(id);
    }
    dead
}

/// Stage 6: each fire removes the occupant of its target cell, if any.
/// Removal applies immediately, so several fires converging on one occupied
/// cell cost exactly one unit. Returns the fires that removed something.
fn resolve_fires(world: &mut World, fires: Vec<Action>) -> Vec<Action> {
    debug_assert!(
        positions_distinct(world),
        "two units share a cell after the move phase"
    );

    let mut effective = Vec::new();
    for action in fires {
        let Some(target) = action.target(world) else {
            continue;
        };
        if let Some(victim) = world.remove_unit_at(target) {
            trace!(unit = victim, by = action.unit_id(), "unit fired down");
            effective.push(action);
        }
    }
    effective
}

fn positions_distinct(world: &World) -> bool {
    let mut seen = BTreeSet::new();
    world.units().values().all(|unit| seen.insert(unit.position))
}

#[cfg(test)]
mod tick_tests {
    use serde_json::json;

    use super::*;
    use crate::config::UnitConfig;

    fn unit(id: u32, spawn: (i32, i32)) -> UnitConfig {
        UnitConfig {
            id,
            spawn_x: spawn.0,
            spawn_y: spawn.1,
            position_x: None,
            position_y: None,
        }
    }

    fn placed(id: u32, spawn: (i32, i32), position: (i32, i32)) -> UnitConfig {
        UnitConfig {
            position_x: Some(position.0),
            position_y: Some(position.1),
            ..unit(id, spawn)
        }
    }

    fn world(teams: &[Vec<UnitConfig>]) -> World {
        World::new(10, 10, teams).unwrap()
    }

    fn move_cmd(unit_id: u32, x: i32, y: i32) -> Value {
        json!({"action": "move", "properties": {"unit_id": unit_id, "x": x, "y": y}})
    }

    fn teleport_cmd(unit_id: u32) -> Value {
        json!({"action": "teleport", "properties": {"unit_id": unit_id}})
    }

    fn fire_cmd(unit_id: u32, x: i32, y: i32) -> Value {
        json!({"action": "fire", "properties": {"unit_id": unit_id, "x": x, "y": y}})
    }

    fn position(world: &World, id: u32) -> Coord {
        world.unit(id).unwrap().position
    }

    #[test]
    fn foreign_and_unknown_units_dropped() {
        let world = world(&[vec![unit(0, (0, 0))], vec![unit(1, (9, 9))]]);

        // non-existent team index
        let commands = TeamCommands::from([(2, vec![teleport_cmd(0)])]);
        assert!(authorize(&world, &commands).is_empty());

        // someone else's unit
        let commands = TeamCommands::from([(0, vec![teleport_cmd(1)])]);
        assert!(authorize(&world, &commands).is_empty());

        // non-existent unit
        let commands = TeamCommands::from([(0, vec![teleport_cmd(2)])]);
        assert!(authorize(&world, &commands).is_empty());

        // own unit passes
        let commands = TeamCommands::from([(0, vec![teleport_cmd(0)])]);
        assert_eq!(authorize(&world, &commands).len(), 1);
    }

    #[test]
    fn malformed_commands_do_not_poison_the_batch() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (9, 9))]]);
        let commands = TeamCommands::from([(
            0,
            vec![
                json!({"action": "warp"}),
                json!(42),
                move_cmd(0, 3, 3), // out of range
                move_cmd(0, 1, 1),
            ],
        )]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(1, 1));
        assert_eq!(w.log()[0].actions, vec![Action::Move { unit_id: 0, x: 1, y: 1 }]);
    }

    #[test]
    fn free_move_in_every_direction() {
        for target in [(0, 0), (0, 1), (0, 2), (1, 2), (2, 2), (2, 1), (2, 0), (1, 0)] {
            let mut w = world(&[vec![unit(0, (1, 1))]]);
            let commands = TeamCommands::from([(0, vec![move_cmd(0, target.0, target.1)])]);
            run_tick(&mut w, &commands);
            assert_eq!(position(&w, 0), Coord::new(target.0, target.1), "move to {target:?}");
        }
    }

    #[test]
    fn same_target_cancels_both() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (2, 2))]]);
        let commands = TeamCommands::from([
            (0, vec![move_cmd(0, 1, 1)]),
            (1, vec![move_cmd(1, 1, 1)]),
        ]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(0, 0));
        assert_eq!(position(&w, 1), Coord::new(2, 2));
        assert!(w.log()[0].actions.is_empty());
    }

    #[test]
    fn swap_succeeds() {
        // teammates, so the elimination pass stays out of the picture
        let mut w = world(&[vec![unit(0, (0, 0)), unit(1, (1, 1))]]);
        let commands = TeamCommands::from([(
            0,
            vec![move_cmd(0, 1, 1), move_cmd(1, 0, 0)],
        )]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(1, 1));
        assert_eq!(position(&w, 1), Coord::new(0, 0));
    }

    #[test]
    fn blocked_swap_freezes_everyone() {
        // units 0 and 2 contend for (1, 0); unit 1 walks into unit 2's
        // now-stationary cell and is blocked as well
        let mut w = world(&[
            vec![placed(0, (9, 0), (0, 0))],
            vec![placed(1, (4, 4), (1, 0)), placed(2, (5, 5), (0, 1))],
        ]);
        let commands = TeamCommands::from([
            (0, vec![move_cmd(0, 1, 0)]),
            (1, vec![move_cmd(1, 0, 1), move_cmd(2, 1, 0)]),
        ]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(0, 0));
        assert_eq!(position(&w, 1), Coord::new(1, 0));
        assert_eq!(position(&w, 2), Coord::new(0, 1));
    }

    #[test]
    fn moving_into_stationary_unit_is_skipped_silently() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (1, 1))]]);
        let commands = TeamCommands::from([(0, vec![move_cmd(0, 1, 1)])]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(0, 0));
        assert!(w.log()[0].actions.is_empty());
    }

    #[test]
    fn teleport_recalls_to_spawn() {
        let mut w = world(&[vec![placed(0, (0, 0), (5, 5))], vec![unit(1, (9, 9))]]);
        let commands = TeamCommands::from([(0, vec![teleport_cmd(0)])]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(0, 0));
        assert_eq!(w.log()[0].actions, vec![Action::Teleport { unit_id: 0 }]);
    }

    #[test]
    fn teleport_contends_for_the_spawn_cell_like_any_move() {
        // unit 1 steps onto unit 0's spawn cell while unit 0 recalls to it
        let mut w = world(&[
            vec![placed(0, (5, 5), (2, 2))],
            vec![placed(1, (9, 9), (4, 4))],
        ]);
        let commands = TeamCommands::from([
            (0, vec![teleport_cmd(0)]),
            (1, vec![move_cmd(1, 5, 5)]),
        ]);

        run_tick(&mut w, &commands);
        assert_eq!(position(&w, 0), Coord::new(2, 2));
        assert_eq!(position(&w, 1), Coord::new(4, 4));
    }

    #[test]
    fn unit_next_to_enemy_spawn_is_eliminated() {
        // unit 0 ends the tick at Manhattan distance 1 from unit 1's spawn
        let mut w = world(&[
            vec![placed(0, (0, 0), (8, 9))],
            vec![placed(1, (9, 9), (5, 5))],
        ]);

        run_tick(&mut w, &TeamCommands::new());
        assert!(w.unit(0).is_none());
        assert!(w.unit(1).is_some());
        assert_eq!(w.remaining_teams().iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn arriving_next_to_enemy_spawn_this_tick_is_fatal() {
        let mut w = world(&[
            vec![placed(0, (0, 0), (7, 9))],
            vec![placed(1, (9, 9), (5, 5))],
        ]);
        let commands = TeamCommands::from([(0, vec![move_cmd(0, 8, 9)])]);

        run_tick(&mut w, &commands);
        assert!(w.unit(0).is_none());
    }

    #[test]
    fn distance_two_from_enemy_spawn_survives() {
        let mut w = world(&[
            vec![placed(0, (0, 0), (7, 9))],
            vec![placed(1, (9, 9), (5, 5))],
        ]);

        run_tick(&mut w, &TeamCommands::new());
        assert!(w.unit(0).is_some());
    }

    #[test]
    fn own_team_spawns_are_harmless() {
        let mut w = world(&[
            vec![unit(0, (0, 0)), placed(1, (4, 4), (1, 0))],
            vec![unit(2, (9, 9))],
        ]);

        run_tick(&mut w, &TeamCommands::new());
        assert!(w.unit(0).is_some());
        assert!(w.unit(1).is_some());
    }

    #[test]
    fn mutual_spawn_kill_removes_both() {
        let mut w = world(&[
            vec![placed(0, (4, 4), (1, 0))],
            vec![placed(1, (0, 0), (3, 4))],
        ]);

        run_tick(&mut w, &TeamCommands::new());
        assert!(w.units().is_empty());
        assert!(w.remaining_teams().is_empty());
    }

    #[test]
    fn fire_removes_the_occupant() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (2, 2))]]);
        let commands = TeamCommands::from([(0, vec![fire_cmd(0, 2, 2)])]);

        run_tick(&mut w, &commands);
        assert!(w.unit(0).is_some());
        assert!(w.unit(1).is_none());
        assert_eq!(w.log()[0].actions, vec![Action::Fire { unit_id: 0, x: 2, y: 2 }]);
    }

    #[test]
    fn fire_at_empty_cell_is_a_no_op() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (9, 9))]]);
        let commands = TeamCommands::from([(0, vec![fire_cmd(0, 2, 2)])]);

        run_tick(&mut w, &commands);
        assert_eq!(w.units().len(), 2);
        assert!(w.log()[0].actions.is_empty());
    }

    #[test]
    fn mutual_fire_kills_both() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (2, 2))]]);
        let commands = TeamCommands::from([
            (0, vec![fire_cmd(0, 2, 2)]),
            (1, vec![fire_cmd(1, 0, 0)]),
        ]);

        run_tick(&mut w, &commands);
        assert!(w.units().is_empty());
    }

    #[test]
    fn converging_fires_cost_one_unit() {
        let mut w = world(&[
            vec![unit(0, (0, 0)), placed(1, (4, 4), (2, 0))],
            vec![placed(2, (9, 9), (1, 1))],
        ]);
        let commands = TeamCommands::from([(
            0,
            vec![fire_cmd(0, 1, 1), fire_cmd(1, 1, 1)],
        )]);

        run_tick(&mut w, &commands);
        assert!(w.unit(2).is_none());
        // only the first fire had a visible effect
        assert_eq!(w.log()[0].actions, vec![Action::Fire { unit_id: 0, x: 1, y: 1 }]);
    }

    #[test]
    fn spawn_killed_unit_cannot_fire() {
        // unit 0 sits next to unit 1's spawn: it dies in the elimination
        // pass, so its queued fire at unit 1 never lands
        let mut w = world(&[
            vec![placed(0, (0, 0), (8, 9))],
            vec![unit(1, (9, 9))],
        ]);
        let commands = TeamCommands::from([(0, vec![fire_cmd(0, 9, 9)])]);

        run_tick(&mut w, &commands);
        assert!(w.unit(0).is_none());
        assert!(w.unit(1).is_some());
        assert!(w.log()[0].actions.is_empty());
    }

    #[test]
    fn empty_round_still_produces_a_tick() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (9, 9))]]);

        run_tick(&mut w, &TeamCommands::new());
        assert_eq!(w.ticks(), 1);
        assert_eq!(w.log().len(), 1);
        assert!(w.log()[0].actions.is_empty());
        assert_eq!(w.log()[0].units.len(), 2);
        assert_eq!(position(&w, 0), Coord::new(0, 0));
    }

    #[test]
    fn log_snapshot_reflects_the_post_tick_world() {
        let mut w = world(&[vec![unit(0, (0, 0))], vec![unit(1, (9, 9))]]);
        let commands = TeamCommands::from([(0, vec![move_cmd(0, 1, 1)])]);

        run_tick(&mut w, &commands);
        let record = &w.log()[0];
        let moved = record.units.iter().find(|u| u.id == 0).unwrap();
        assert_eq!((moved.x, moved.y), (1, 1));
        assert_eq!(w.ticks(), 1);
    }
}
