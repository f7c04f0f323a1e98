//! Reference agent: answers every round with random in-bounds moves for its
//! own units. Useful as a sparring partner and for smoke-testing a server.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use grid_arena::protocol::{Handshake, RoundState};

const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

fn main() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let config: Handshake = serde_json::from_str(&next_line(&mut lines)?)?;
    let mine: Vec<u32> = config
        .units
        .iter()
        .filter(|unit| unit.team == config.my_team_id)
        .map(|unit| unit.id)
        .collect();

    let mut positions: HashMap<u32, (i32, i32)> = config
        .units
        .iter()
        .map(|unit| (unit.id, (unit.spawn_x, unit.spawn_y)))
        .collect();

    let mut rng = rand::thread_rng();
    let stdout = io::stdout();

    loop {
        let Ok(line) = next_line(&mut lines) else {
            break; // server gone, match over
        };
        let state: RoundState = serde_json::from_str(&line)?;

        let alive: HashSet<u32> = state.units.iter().map(|unit| unit.id).collect();
        for unit in &state.units {
            positions.insert(unit.id, (unit.x, unit.y));
        }

        let command: Vec<_> = mine
            .iter()
            .copied()
            .filter(|id| alive.contains(id))
            .map(|id| {
                let (x, y) = positions[&id];
                let (move_x, move_y) =
                    random_step(&mut rng, x, y, config.map_width, config.map_height);
                json!({
                    "action": "move",
                    "properties": {"unit_id": id, "x": move_x, "y": move_y}
                })
            })
            .collect();

        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &command)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }
    Ok(())
}

fn random_step(rng: &mut impl Rng, x: i32, y: i32, width: u32, height: u32) -> (i32, i32) {
    loop {
        let &(dx, dy) = DIRECTIONS.choose(rng).expect("directions are not empty");
        let (new_x, new_y) = (x + dx, y + dy);
        if new_x >= 0 && new_y >= 0 && new_x < width as i32 && new_y < height as i32 {
            return (new_x, new_y);
        }
    }
}

fn next_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> anyhow::Result<String> {
    Ok(lines.next().context("server closed the stream")??)
}
