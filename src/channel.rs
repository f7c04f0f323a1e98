//! Duplex line-protocol transports to agents.
//!
//! A channel carries exactly one conversation: one line out, one line in,
//! repeated. The match loop neither knows nor cares whether the peer is a
//! spawned subprocess or a socket; the framing is identical for both (see
//! [`crate::protocol`]). Channels carry no deadline of their own; the match
//! loop bounds every call with its configured timeouts.

use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::trace;

/// One duplex line-message connection to an agent.
#[async_trait]
pub trait ClientChannel: Send {
    /// Send one message, newline-terminated.
    async fn send_message(&mut self, msg: &str) -> anyhow::Result<()>;

    /// Receive one newline-terminated message, without the newline.
    async fn recv_command(&mut self) -> anyhow::Result<String>;
}

/// Agent running as a child process, speaking over its stdio.
///
/// The child is killed when the channel is dropped, so evicting a channel
/// from the match is enough to reap its agent.
pub struct ProcessChannel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessChannel {
    /// Spawn `command` through the shell with piped stdio. Stderr is
    /// discarded; agents talk on stdout only.
    ///
    /// # Errors
    /// The process could not be spawned or its stdio was not captured.
    pub fn spawn(command: &str) -> anyhow::Result<ProcessChannel> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("could not spawn agent `{command}`"))?;

        let stdin = child.stdin.take().context("agent stdin not captured")?;
        let stdout = child.stdout.take().context("agent stdout not captured")?;
        trace!(pid = child.id(), command, "agent spawned");

        Ok(ProcessChannel {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// OS pid of the agent process, while it is still running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl ClientChannel for ProcessChannel {
    async fn send_message(&mut self, msg: &str) -> anyhow::Result<()> {
        self.stdin.write_all(msg.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn recv_command(&mut self) -> anyhow::Result<String> {
        read_message(&mut self.stdout).await
    }
}

/// Agent connected over a TCP socket.
pub struct TcpChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpChannel {
    /// Wrap an accepted stream. Dropping the channel closes the socket.
    pub fn new(stream: TcpStream) -> TcpChannel {
        let (read_half, write_half) = stream.into_split();
        TcpChannel {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }
}

#[async_trait]
impl ClientChannel for TcpChannel {
    async fn send_message(&mut self, msg: &str) -> anyhow::Result<()> {
        self.writer.write_all(msg.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_command(&mut self) -> anyhow::Result<String> {
        read_message(&mut self.reader).await
    }
}

async fn read_message<R>(reader: &mut R) -> anyhow::Result<String>
where
    R: AsyncBufReadExt + Unpin + Send,
{
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .context("error while reading stream")?;
    if n == 0 {
        bail!("connection closed by client");
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Launch one subprocess agent per shell command string, in order: command
/// `i` plays team `i`.
///
/// # Errors
/// The first command that fails to spawn; already-spawned agents are killed
/// again on drop.
pub fn spawn_agents(commands: &[String]) -> anyhow::Result<Vec<Box<dyn ClientChannel>>> {
    commands
        .iter()
        .map(|command| {
            ProcessChannel::spawn(command).map(|channel| Box::new(channel) as Box<dyn ClientChannel>)
        })
        .collect()
}
