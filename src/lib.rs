//! # Grid Arena
//!
//! A turn-based grid combat server arbitrating matches between independently
//! controlled agents ("bots") connected over subprocess pipes or TCP sockets.
//!
//! Each round the server broadcasts the current world state to every
//! connected agent, collects one command batch per agent under a deadline,
//! and resolves the collected batches into exactly one new world state. A
//! slow, crashed or protocol-breaking agent loses its seat; the match never
//! stalls on it and never aborts because of it. Every action that took
//! visible effect is appended to a per-tick log which is persisted at the end
//! of the match and can be replayed deterministically.
//!
//! # Documentation Overview
//!
//! - Match rules and tick resolution: [`world`], [`action`] and [`engine`].
//! - Agent transports (subprocess stdio or TCP): [`channel`].
//! - Per-round orchestration and timeouts: [`match_loop`] and [`server`].
//! - Map files and operational parameters: [`config`].
//! - Log replay and verification: [`replay`].
//!
//! # Usage Example
//!
//! Running a local match between two agent executables:
//!
//! ```no_run
//! use grid_arena::channel::spawn_agents;
//! use grid_arena::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MapConfig::load("map.json")?;
//!     let world = World::from_config(&config)?;
//!
//!     // One subprocess agent per team, talking JSON lines over stdio.
//!     let channels = spawn_agents(&["./bot_a".into(), "./bot_b".into()])?;
//!
//!     let settings = MatchSettings::new().with_max_ticks(50);
//!     let world = MatchLoop::new(world, channels, settings).run().await?;
//!
//!     println!("winners: {:?}", world.winners());
//!     Ok(())
//! }
//! ```
//!
//! # Agent Requirements
//!
//! - Agents speak newline-delimited JSON: one message per line (see
//!   [`protocol`]).
//! - After the one-time handshake, an agent must answer every round-state
//!   message with one command batch within the execution timeout.
//! - A malformed command inside a batch is dropped; a batch that is not a
//!   JSON array, a closed stream, or a missed deadline disconnects the agent.
#![warn(missing_docs)]

pub mod action;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod match_loop;
pub mod protocol;
pub mod replay;
pub mod server;
pub mod world;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use grid_arena::prelude::*;
/// ```
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::channel::{ClientChannel, ProcessChannel, TcpChannel};
    pub use crate::config::{MapConfig, MatchSettings};
    pub use crate::match_loop::MatchLoop;
    pub use crate::world::World;
}
