//! Length-prefixed framing for packets on a TCP stream
//!
//! Every packet travels as a 4-byte big-endian length followed by that many
//! bytes of bincode. Both directions use the same framing; the packet enums
//! themselves carry the type tag.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted from a peer.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed by peer")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(u32),
    #[error("malformed packet: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("unexpected packet: {0}")]
    Unexpected(&'static str),
    #[error("unsupported protocol version {0}")]
    VersionMismatch(u32),
}

impl ProtocolError {
    /// True for errors caused by the peer breaking the protocol rather than
    /// by the transport going away.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::FrameTooLarge(_)
                | ProtocolError::Malformed(_)
                | ProtocolError::Unexpected(_)
                | ProtocolError::VersionMismatch(_)
        )
    }
}

/// Serializes a packet into a complete frame, length prefix included.
pub fn encode_frame<T: Serialize>(packet: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = bincode::serialize(packet)?;
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads one frame and decodes it.
///
/// A clean end of stream before the first length byte is reported as
/// `Closed`; a stream that ends mid-frame is an I/O error.
pub async fn read_packet<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(ProtocolError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

pub async fn write_packet<W, T>(writer: &mut W, packet: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
