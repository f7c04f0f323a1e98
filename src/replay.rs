//! Deterministic replay of a persisted match log.
//!
//! A log stores, per tick, everything that took visible effect. Feeding
//! those actions back through the engine against the same setup must
//! reproduce every intermediate snapshot exactly; [`replay`] verifies this
//! tick by tick and fails loudly on the first divergence.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context};

use crate::config::MapConfig;
use crate::engine::{self, TeamCommands};
use crate::protocol::TickRecord;
use crate::world::World;

/// Re-run `log` against the setup it was recorded from.
///
/// Returns the reconstructed final world.
///
/// # Errors
/// The setup is rejected, an action references a unit that is not alive at
/// its tick, or a replayed snapshot diverges from the recorded one.
pub fn replay(config: &MapConfig, log: &[TickRecord]) -> anyhow::Result<World> {
    let mut world = World::from_config(config).context("replay setup rejected")?;

    for record in log {
        let mut commands = TeamCommands::new();
        for action in &record.actions {
            let unit = world.unit(action.unit_id()).with_context(|| {
                format!("logged action for unknown unit {}", action.unit_id())
            })?;
            let raw = serde_json::to_value(action).expect("action always serializes");
            commands.entry(unit.team).or_default().push(raw);
        }

        engine::run_tick(&mut world, &commands);

        if world.round_state().units != record.units {
            bail!("replay diverged at tick {}", world.ticks());
        }
    }
    Ok(world)
}

/// Load a persisted match log.
///
/// # Errors
/// The file cannot be read or does not hold a list of tick records.
pub fn load_log(path: impl AsRef<Path>) -> anyhow::Result<Vec<TickRecord>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("could not open log file {}", path.as_ref().display()))?;
    serde_json::from_reader(BufReader::new(file)).context("log file is not valid")
}
