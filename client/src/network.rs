//! Connection to the maze server
//!
//! `connect` performs the handshake and splits the connection into two tasks:
//! a reader that turns server packets into `ServerEvent`s and a writer that
//! sends queued commands. Dropping the `CommandSender` closes the write side,
//! which the server treats as a graceful leave.

use log::{debug, info, warn};
use shared::{
    read_packet, write_packet, ClientPacket, Maze, Player, PlayerId, ProtocolError, ServerPacket,
    PROTOCOL_VERSION,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("connection to the server is closed")]
    Disconnected,
}

/// Everything the server can tell the client
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Snapshot {
        maze: Arc<Maze>,
        players: BTreeMap<PlayerId, Player>,
    },
    Winner(String),
    /// The connection ended. Always the last event.
    Disconnected,
}

impl From<ServerPacket> for ServerEvent {
    fn from(packet: ServerPacket) -> Self {
        match packet {
            ServerPacket::StateSnapshot { maze, players } => ServerEvent::Snapshot { maze, players },
            ServerPacket::WinnerAnnouncement { winner_name } => ServerEvent::Winner(winner_name),
        }
    }
}

/// Handle for sending movement commands to the server
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSender {
    /// Queues a command. The server ignores anything that is not a direction.
    pub fn send(&self, direction: impl Into<String>) -> Result<(), ClientError> {
        self.tx
            .send(direction.into())
            .map_err(|_| ClientError::Disconnected)
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Connects to a server and joins under `display_name`.
pub async fn connect(
    addr: &str,
    display_name: &str,
) -> Result<(CommandSender, EventReceiver), ClientError> {
    info!("Connecting to {}...", addr);

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY: {}", e);
    }

    let (reader, writer) = stream.into_split();
    let connection = start(reader, writer, display_name).await?;

    info!("Connected to {} as {}", addr, display_name);
    Ok(connection)
}

/// Sends the handshake over an already open stream and spawns the reader and
/// writer tasks.
pub async fn start<R, W>(
    reader: R,
    mut writer: W,
    display_name: &str,
) -> Result<(CommandSender, EventReceiver), ClientError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let handshake = ClientPacket::Handshake {
        protocol_version: PROTOCOL_VERSION,
        display_name: display_name.to_string(),
    };
    write_packet(&mut writer, &handshake).await?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_reader(reader, event_tx));
    tokio::spawn(run_writer(writer, command_rx));

    Ok((CommandSender { tx: command_tx }, event_rx))
}

async fn run_reader<R>(mut reader: R, event_tx: mpsc::UnboundedSender<ServerEvent>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_packet::<_, ServerPacket>(&mut reader).await {
            Ok(packet) => {
                if event_tx.send(packet.into()).is_err() {
                    return;
                }
            }
            Err(ProtocolError::Closed) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Connection lost: {}", e);
                break;
            }
        }
    }

    let _ = event_tx.send(ServerEvent::Disconnected);
}

async fn run_writer<W>(mut writer: W, mut command_rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(direction) = command_rx.recv().await {
        debug!("Sending command {:?}", direction);
        if let Err(e) = write_packet(&mut writer, &ClientPacket::Command { direction }).await {
            warn!("Failed to send command: {}", e);
            return;
        }
    }

    let _ = writer.shutdown().await;
}
