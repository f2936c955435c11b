//! Transport-facing pieces shared by both binaries: the event vocabulary the
//! core consumes and fixed-size frame I/O over any async byte stream.

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Frame, FRAME_LEN};
use crate::ConnectionHandle;

/// Events delivered by the transport to the server's control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected {
        identity: ConnectionHandle,
        /// Peer IP address in text form, without the port
        remote_addr: String,
    },
    /// Emitted for closed sockets and for liveness timeouts alike.
    Disconnected { identity: ConnectionHandle },
    MessageReceived {
        identity: ConnectionHandle,
        bytes: Bytes,
    },
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the stream
/// cleanly on a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut frame = [0u8; FRAME_LEN];
    let first = reader.read(&mut frame).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut frame[first..]).await?;
    Ok(Some(frame))
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
