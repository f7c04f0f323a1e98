//! Map files and operational match parameters.
//!
//! A map file is a single JSON record holding the grid size and the team
//! roster; its constraints are exactly the world setup invariants and are
//! checked by [`World::from_config`](crate::world::World::from_config), not
//! here. Operational parameters (timeouts, tick cap, log destination) live
//! in [`MatchSettings`], created programmatically with builder-style
//! `with_*` methods.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A parsed map file: grid size plus one unit list per team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Grid width in cells, positive.
    pub map_width: u32,
    /// Grid height in cells, positive.
    pub map_height: u32,
    /// One roster per team; the team's id is its index here.
    pub teams: Vec<Vec<UnitConfig>>,
}

impl MapConfig {
    /// Read and parse a map file.
    ///
    /// # Errors
    /// The file cannot be opened or is not valid JSON of this shape. Setup
    /// invariants are checked later, at world construction.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<MapConfig> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("could not open map file {}", path.as_ref().display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("map file {} is not valid", path.as_ref().display()))
    }
}

/// One roster entry. The initial position defaults to the spawn cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit id, unique across the whole map.
    pub id: u32,
    /// Spawn cell column.
    pub spawn_x: i32,
    /// Spawn cell row.
    pub spawn_y: i32,
    /// Initial column override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<i32>,
    /// Initial row override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<i32>,
}

/// Operational parameters of one match.
///
/// Defaults: 2 s response timeout (bounds every broadcast send), 5 s
/// execution timeout (bounds every command collect), 100 ticks hard cap,
/// log persisted to `result.json`.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub(crate) response_timeout: Duration,
    pub(crate) execution_timeout: Duration,
    pub(crate) max_ticks: u32,
    pub(crate) log_path: PathBuf,
}

impl MatchSettings {
    /// Create settings with the default parameters.
    pub fn new() -> MatchSettings {
        MatchSettings {
            response_timeout: Duration::from_secs(2),
            execution_timeout: Duration::from_secs(5),
            max_ticks: 100,
            log_path: PathBuf::from("result.json"),
        }
    }

    /// Deadline for delivering one message to one agent.
    pub fn with_response_timeout(mut self, value: Duration) -> MatchSettings {
        self.response_timeout = value;
        self
    }

    /// Deadline for one agent's command batch each round.
    pub fn with_execution_timeout(mut self, value: Duration) -> MatchSettings {
        self.execution_timeout = value;
        self
    }

    /// Hard cap on match length: the match stops once this many ticks have
    /// completed, whatever the agents do.
    pub fn with_max_ticks(mut self, value: u32) -> MatchSettings {
        self.max_ticks = value;
        self
    }

    /// Where the match log is persisted when the match stops.
    pub fn with_log_path(mut self, value: impl Into<PathBuf>) -> MatchSettings {
        self.log_path = value.into();
        self
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::new()
    }
}
