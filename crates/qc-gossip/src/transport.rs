//! Frames a raw duplex byte stream into [`Frame`]s with an outer
//! length-prefix, so a transport read always yields exactly one frame's
//! worth of bytes. The actual stream itself (TLS/QUIC socket, in-memory
//! duplex pipe in tests) is anything implementing
//! [`tokio::io::AsyncRead`]/[`tokio::io::AsyncWrite`] — this crate does not
//! own the transport's authentication; `qc-peer-identity` does that before
//! a session is ever constructed.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::GossipError;
use crate::frame::Frame;

/// Largest frame this transport will accept, guarding a malicious/broken
/// peer from claiming an unbounded length prefix (spec.md §4.5 backpressure
/// — an oversized claim is a protocol violation, not a transport crash).
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

pub struct FrameTransport<S> {
    stream: S,
}

impl<S> FrameTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), GossipError> {
        let encoded = frame.encode();
        self.stream.write_u32_le(encoded.len() as u32).await?;
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn recv_frame(&mut self) -> Result<Frame, GossipError> {
        let len = self.stream.read_u32_le().await?;
        if len > MAX_FRAME_BYTES {
            return Err(GossipError::Decode(format!(
                "claimed frame length {len} exceeds {MAX_FRAME_BYTES}"
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.stream.read_exact(&mut buf).await?;
        Frame::decode(Bytes::from(buf))
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
