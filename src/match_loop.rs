//! Per-round orchestration of one match.
//!
//! The loop alternates strictly between an I/O phase and a mutation phase.
//! Within a round, the broadcast to every channel completes (or times out)
//! before any collect starts, every collect settles before the tick runs,
//! and the world is touched only after the last channel future has
//! resolved. Each channel future borrows its own entry of the connection
//! map, and the map itself changes only between phases, once the join
//! barrier has settled.
//!
//! A channel that errors, stalls past its deadline, or sends a batch that
//! is not a JSON array loses its seat immediately. Its team simply submits
//! nothing from then on; nobody else's round is disturbed.

use std::collections::BTreeMap;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::channel::ClientChannel;
use crate::config::MatchSettings;
use crate::engine::{self, TeamCommands};
use crate::world::{TeamId, World};

/// Drives a match: broadcasts state, collects commands under deadlines,
/// runs ticks, and evicts channels that fail, stall or lose their team.
pub struct MatchLoop {
    world: World,
    clients: BTreeMap<TeamId, Box<dyn ClientChannel>>,
    settings: MatchSettings,
}

impl MatchLoop {
    /// Seat the channels in order: channel `i` plays team `i`.
    pub fn new(
        world: World,
        channels: Vec<Box<dyn ClientChannel>>,
        settings: MatchSettings,
    ) -> MatchLoop {
        MatchLoop {
            world,
            clients: channels.into_iter().enumerate().collect(),
            settings,
        }
    }

    /// Run the match to completion and persist the log.
    ///
    /// The match stops when no channel remains connected, when the tick cap
    /// is reached, or when the world reports itself ended — whichever comes
    /// first. The log is persisted in every case.
    ///
    /// # Errors
    /// Only log persistence can fail; per-channel and per-command failures
    /// are contained and never abort the match.
    pub async fn run(mut self) -> anyhow::Result<World> {
        self.handshake().await;

        while !self.world.is_ended()
            && !self.clients.is_empty()
            && self.world.ticks() < self.settings.max_ticks
        {
            self.play_round().await;
        }

        info!(
            ticks = self.world.ticks(),
            winners = ?self.world.winners(),
            "match over"
        );
        self.world.save_log(&self.settings.log_path)?;
        Ok(self.world)
    }

    /// Send each team its one-time map description, before the first round.
    async fn handshake(&mut self) {
        let messages: BTreeMap<TeamId, String> = self
            .clients
            .keys()
            .map(|&team| {
                let handshake = self.world.handshake(team);
                let encoded =
                    serde_json::to_string(&handshake).expect("handshake always serializes");
                (team, encoded)
            })
            .collect();
        self.broadcast(messages).await;
    }

    async fn play_round(&mut self) {
        // 1. state goes out to every connected channel
        let state =
            serde_json::to_string(&self.world.round_state()).expect("state always serializes");
        let messages = self.clients.keys().map(|&team| (team, state.clone())).collect();
        self.broadcast(messages).await;

        // 2. one command batch per channel, all settled before we move on
        let commands = self.collect_commands().await;

        // 3. the tick runs strictly after the round's I/O is done
        engine::run_tick(&mut self.world, &commands);
        debug!("tick {} complete\n{}", self.world.ticks(), self.world);

        // 4. channels whose team died this tick are gone
        let lost: Vec<TeamId> = self
            .clients
            .keys()
            .copied()
            .filter(|team| !self.world.remaining_teams().contains(team))
            .collect();
        for team in lost {
            self.disconnect(team, "team eliminated");
        }
    }

    /// Concurrent send, one task per channel, each bounded by the response
    /// timeout. Failed or late channels are disconnected once every send
    /// has settled.
    async fn broadcast(&mut self, messages: BTreeMap<TeamId, String>) {
        let deadline = self.settings.response_timeout;
        let sends = self.clients.iter_mut().filter_map(|(&team, channel)| {
            let msg = messages.get(&team)?.clone();
            Some(async move {
                match timeout(deadline, channel.send_message(&msg)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(error)) => Some((team, format!("send failed: {error:#}"))),
                    Err(_) => Some((team, "send timed out".to_string())),
                }
            })
        });

        let failures: Vec<(TeamId, String)> =
            join_all(sends).await.into_iter().flatten().collect();
        for (team, reason) in failures {
            self.disconnect(team, &reason);
        }
    }

    /// Scatter one receive per channel, gather under the execution timeout.
    /// The round proceeds only once every request has settled; a timeout,
    /// transport error or non-array batch costs that channel its seat and
    /// yields no commands for its team this round.
    async fn collect_commands(&mut self) -> TeamCommands {
        let deadline = self.settings.execution_timeout;
        let requests = self.clients.iter_mut().map(|(&team, channel)| async move {
            match timeout(deadline, channel.recv_command()).await {
                Ok(Ok(line)) => (team, Ok(line)),
                Ok(Err(error)) => (team, Err(format!("receive failed: {error:#}"))),
                Err(_) => (team, Err("response timed out".to_string())),
            }
        });
        let settled = join_all(requests).await;

        let mut commands = TeamCommands::new();
        let mut failures = Vec::new();
        for (team, outcome) in settled {
            match outcome {
                Ok(line) => match serde_json::from_str::<Vec<Value>>(&line) {
                    Ok(batch) => {
                        commands.insert(team, batch);
                    }
                    Err(error) => {
                        failures.push((team, format!("command batch is not a JSON array: {error}")));
                    }
                },
                Err(reason) => failures.push((team, reason)),
            }
        }
        for (team, reason) in failures {
            self.disconnect(team, &reason);
        }
        commands
    }

    /// Remove a channel from the match. Dropping it tears down its
    /// transport (and kills its agent process, if it has one).
    fn disconnect(&mut self, team: TeamId, reason: &str) {
        if self.clients.remove(&team).is_some() {
            warn!(team, reason, "client disconnected");
        }
    }
}
