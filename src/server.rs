//! TCP front end: seat one connection per team, then run the match.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::channel::{ClientChannel, TcpChannel};
use crate::config::MatchSettings;
use crate::match_loop::MatchLoop;
use crate::world::World;

/// Accept exactly one connection per team on `addr`, in arrival order, then
/// drive the match to completion. The listener is closed once every seat is
/// taken, so latecomers are refused.
///
/// # Errors
/// Bind or accept failures, and log persistence at the end of the match.
pub async fn serve(addr: &str, world: World, settings: MatchSettings) -> anyhow::Result<World> {
    let seats = world.remaining_teams().len();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!(addr = %listener.local_addr()?, seats, "waiting for agents");

    let mut channels: Vec<Box<dyn ClientChannel>> = Vec::with_capacity(seats);
    while channels.len() < seats {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        info!(%peer, seat = channels.len(), "agent connected");
        channels.push(Box::new(TcpChannel::new(stream)));
    }
    drop(listener);

    MatchLoop::new(world, channels, settings).run().await
}
