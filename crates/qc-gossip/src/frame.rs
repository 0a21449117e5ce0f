//! Gossip frame: `{view_id, payload_len, payload}` (spec.md §6 "Gossip
//! frame"). A `view_id` of -1 terminates the session; gossip itself only
//! ever uses view 0 (multiplexing is `qc-reconnect`'s concern, which reuses
//! this exact envelope per spec.md §6 "Reconnect frame").

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::GossipError;

/// View id that terminates the enclosing session/stream.
pub const TERMINATE_VIEW_ID: i64 = -1;
/// The only view id a plain gossip session (not reconnect) ever uses.
pub const GOSSIP_VIEW_ID: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub view_id: i64,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(view_id: i64, payload: Bytes) -> Self {
        Self { view_id, payload }
    }

    pub fn terminate() -> Self {
        Self {
            view_id: TERMINATE_VIEW_ID,
            payload: Bytes::new(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.view_id == TERMINATE_VIEW_ID
    }

    /// Encodes this frame's `{view_id, payload_len, payload}` header+body.
    /// Does not include any outer length prefix — that is the transport's
    /// job (see [`crate::transport`]).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12 + self.payload.len());
        buf.put_i64_le(self.view_id);
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, GossipError> {
        if bytes.remaining() < 12 {
            return Err(GossipError::Decode("frame header truncated".into()));
        }
        let view_id = bytes.get_i64_le();
        let len = bytes.get_u32_le() as usize;
        if bytes.remaining() < len {
            return Err(GossipError::Decode("frame payload truncated".into()));
        }
        Ok(Frame {
            view_id,
            payload: bytes.slice(0..len),
        })
    }
}
