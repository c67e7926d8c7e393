//! Per-connection session handling
//!
//! A session reads the handshake, asks the world task to register the player,
//! and then splits into two halves:
//! - the reader (this task) forwards every command to the world task
//! - the writer task drains the session's outbound queue onto the socket
//!
//! Whichever half stops first ends the session. The writer signals the reader
//! through a oneshot so a failed write or a server-side close also unblocks a
//! pending read. The reader then sends exactly one `Leave` to the world task.

use crate::client_manager::{outbound_queue, Outbound, OutboundReceiver};
use crate::network::ServerMessage;
use log::{debug, error, info, warn};
use shared::{read_packet, ClientPacket, PlayerId, ProtocolError, PROTOCOL_VERSION};
use std::fmt;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

/// Why a registered session ended.
#[derive(Debug)]
pub enum DisconnectReason {
    /// The client closed the connection cleanly.
    Closed,
    /// Reading from the connection failed.
    Transport(ProtocolError),
    /// The client sent something the protocol does not allow.
    ProtocolViolation(ProtocolError),
    /// The writer stopped, either after a failed write or on request.
    WriterClosed,
    /// The world task is no longer accepting messages.
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed => write!(f, "connection closed"),
            DisconnectReason::Transport(e) => write!(f, "transport error: {}", e),
            DisconnectReason::ProtocolViolation(e) => write!(f, "protocol violation: {}", e),
            DisconnectReason::WriterClosed => write!(f, "connection closed by server"),
            DisconnectReason::ServerShutdown => write!(f, "server shutting down"),
        }
    }
}

impl From<ProtocolError> for DisconnectReason {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Closed => DisconnectReason::Closed,
            e if e.is_violation() => DisconnectReason::ProtocolViolation(e),
            e => DisconnectReason::Transport(e),
        }
    }
}

pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }
    let (reader, writer) = stream.into_split();
    run_session(reader, writer, addr, server_tx).await;
}

/// Drives one connection from handshake to cleanup.
pub async fn run_session<R, W>(
    mut reader: R,
    writer: W,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let name = match read_handshake(&mut reader).await {
        Ok(name) => name,
        Err(e) if e.is_violation() => {
            warn!("Protocol violation from {} during handshake: {}", addr, e);
            return;
        }
        Err(e) => {
            info!("{} left before completing the handshake: {}", addr, e);
            return;
        }
    };

    let (sender, outbound_rx) = outbound_queue();
    let (reply_tx, reply_rx) = oneshot::channel();
    let join = ServerMessage::Join {
        name,
        addr,
        sender,
        reply: reply_tx,
    };
    if server_tx.send(join).is_err() {
        error!("World task is gone, dropping connection from {}", addr);
        return;
    }
    let Ok(player_id) = reply_rx.await else {
        error!("World task dropped the join request from {}", addr);
        return;
    };

    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(run_writer(player_id, writer, outbound_rx, closed_tx));

    let reason = read_commands(player_id, &mut reader, &server_tx, closed_rx).await;
    debug!("Session for player {} ended: {}", player_id, reason);
    let _ = server_tx.send(ServerMessage::Leave { player_id, reason });
}

async fn read_handshake<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match read_packet(reader).await? {
        ClientPacket::Handshake {
            protocol_version,
            display_name,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                return Err(ProtocolError::VersionMismatch(protocol_version));
            }
            Ok(display_name)
        }
        ClientPacket::Command { .. } => Err(ProtocolError::Unexpected("command before handshake")),
    }
}

async fn read_commands<R>(
    player_id: PlayerId,
    reader: &mut R,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
    mut closed_rx: oneshot::Receiver<()>,
) -> DisconnectReason
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            packet = read_packet::<_, ClientPacket>(reader) => match packet {
                Ok(ClientPacket::Command { direction }) => {
                    if server_tx.send(ServerMessage::Command { player_id, direction }).is_err() {
                        return DisconnectReason::ServerShutdown;
                    }
                }
                Ok(ClientPacket::Handshake { .. }) => {
                    let e = ProtocolError::Unexpected("second handshake");
                    warn!("Player {}: {}", player_id, e);
                    return DisconnectReason::ProtocolViolation(e);
                }
                Err(e) => {
                    if e.is_violation() {
                        warn!("Player {}: {}", player_id, e);
                    }
                    return e.into();
                }
            },
            _ = &mut closed_rx => return DisconnectReason::WriterClosed,
        }
    }
}

/// Writes queued frames in order until told to close, the queue is dropped,
/// or a write fails. Dropping `closed_tx` on the way out wakes the reader.
async fn run_writer<W>(
    player_id: PlayerId,
    mut writer: W,
    mut outbound_rx: OutboundReceiver,
    closed_tx: oneshot::Sender<()>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(outbound) = outbound_rx.recv().await {
        match outbound {
            Outbound::Frame(frame) => {
                let written = async {
                    writer.write_all(&frame).await?;
                    writer.flush().await
                };
                if let Err(e) = written.await {
                    error!("Failed to write to client {}: {}", player_id, e);
                    break;
                }
            }
            Outbound::Close => {
                debug!("Closing connection of client {}", player_id);
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    drop(closed_tx);
}
