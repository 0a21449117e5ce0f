//! Reconnect stream messages: one message per `qc_gossip::Frame` payload,
//! the frame's `view_id` identifying which subtree's view the message
//! belongs to (spec.md §6 "Reconnect frame: same multiplexed {view_id,
//! length, bytes} envelope as gossip").

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared_types::{Hash, HASH_LEN};

use crate::error::{AbortReason, ReconnectError};

/// Content of a dirty node's answer, default push view (spec.md §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    Leaf { key: Vec<u8>, value: Vec<u8> },
    Internal { left_hash: Hash, right_hash: Hash },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectMessage {
    /// Learner -> Teacher, default push view: "what's at `path`? I last saw
    /// `known_hash`."
    NodeQuery { path: u64, known_hash: Option<Hash> },
    /// Teacher -> Learner: the learner's `known_hash` still matches; nothing
    /// to send, subtree unchanged.
    NodeClean { path: u64 },
    /// Teacher -> Learner: the node's current hash and content.
    NodeDirty { path: u64, hash: Hash, content: NodeContent },

    /// Learner -> Teacher, virtual-map view, phase 1: "is the internal node
    /// at `path` clean against the virtual map's current state?"
    InternalQuery { path: u64 },
    InternalAnswer { path: u64, clean: bool },
    /// Learner -> Teacher, virtual-map view, phase 2: "send me the leaf."
    LeafQuery { path: u64 },
    LeafAnswer { path: u64, present: bool, key: Vec<u8>, value: Vec<u8> },

    /// Either side: this view's exchange is complete.
    ViewDone,
    /// Either side: terminal failure, carrying why.
    Abort(AbortReason),

    /// Teacher -> Learner, sent on the control view (view id 0): opens a new
    /// view on `target_view`, announcing which protocol it will run.
    /// `virtual_range` is `Some((first_leaf, last_leaf))` for the two-phase
    /// virtual-map view, `None` for the default push view (spec.md §4.8
    /// "view scheduling").
    OpenView {
        target_view: i64,
        path: u64,
        virtual_range: Option<(u64, u64)>,
    },
    /// Teacher -> Learner, control view: `target_view` has finished and its
    /// view id may be reused.
    CloseView { target_view: i64 },
}

fn tag(msg: &ReconnectMessage) -> u8 {
    match msg {
        ReconnectMessage::NodeQuery { .. } => 0,
        ReconnectMessage::NodeClean { .. } => 1,
        ReconnectMessage::NodeDirty { .. } => 2,
        ReconnectMessage::InternalQuery { .. } => 3,
        ReconnectMessage::InternalAnswer { .. } => 4,
        ReconnectMessage::LeafQuery { .. } => 5,
        ReconnectMessage::LeafAnswer { .. } => 6,
        ReconnectMessage::ViewDone => 7,
        ReconnectMessage::Abort(_) => 8,
        ReconnectMessage::OpenView { .. } => 9,
        ReconnectMessage::CloseView { .. } => 10,
    }
}

fn abort_tag(reason: &AbortReason) -> u8 {
    match reason {
        AbortReason::Timeout => 0,
        AbortReason::HashMismatch => 1,
        AbortReason::ProtocolViolation => 2,
        AbortReason::OperatorCancelled => 3,
        AbortReason::TransportClosed => 4,
    }
}

fn abort_from_tag(tag: u8) -> AbortReason {
    match tag {
        0 => AbortReason::Timeout,
        1 => AbortReason::HashMismatch,
        3 => AbortReason::OperatorCancelled,
        4 => AbortReason::TransportClosed,
        _ => AbortReason::ProtocolViolation,
    }
}

fn put_hash(buf: &mut BytesMut, hash: &Hash) {
    buf.put_slice(hash.as_bytes());
}

fn get_hash(buf: &mut Bytes) -> Result<Hash, ReconnectError> {
    if buf.remaining() < HASH_LEN {
        return Err(ReconnectError::Decode("truncated hash".into()));
    }
    let mut bytes = [0u8; HASH_LEN];
    buf.copy_to_slice(&mut bytes);
    Ok(Hash::from_bytes(bytes))
}

fn put_bytes_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32_le(field.len() as u32);
    buf.put_slice(field);
}

fn get_bytes_field(buf: &mut Bytes, field: &'static str) -> Result<Vec<u8>, ReconnectError> {
    if buf.remaining() < 4 {
        return Err(ReconnectError::Decode(format!("truncated {field} length")));
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(ReconnectError::Decode(format!("truncated {field} bytes")));
    }
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

impl ReconnectMessage {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(tag(self));
        match self {
            ReconnectMessage::NodeQuery { path, known_hash } => {
                buf.put_u64_le(*path);
                match known_hash {
                    Some(h) => {
                        buf.put_u8(1);
                        put_hash(&mut buf, h);
                    }
                    None => buf.put_u8(0),
                }
            }
            ReconnectMessage::NodeClean { path } => buf.put_u64_le(*path),
            ReconnectMessage::NodeDirty { path, hash, content } => {
                buf.put_u64_le(*path);
                put_hash(&mut buf, hash);
                match content {
                    NodeContent::Leaf { key, value } => {
                        buf.put_u8(0);
                        put_bytes_field(&mut buf, key);
                        put_bytes_field(&mut buf, value);
                    }
                    NodeContent::Internal { left_hash, right_hash } => {
                        buf.put_u8(1);
                        put_hash(&mut buf, left_hash);
                        put_hash(&mut buf, right_hash);
                    }
                }
            }
            ReconnectMessage::InternalQuery { path } => buf.put_u64_le(*path),
            ReconnectMessage::InternalAnswer { path, clean } => {
                buf.put_u64_le(*path);
                buf.put_u8(if *clean { 1 } else { 0 });
            }
            ReconnectMessage::LeafQuery { path } => buf.put_u64_le(*path),
            ReconnectMessage::LeafAnswer { path, present, key, value } => {
                buf.put_u64_le(*path);
                buf.put_u8(if *present { 1 } else { 0 });
                put_bytes_field(&mut buf, key);
                put_bytes_field(&mut buf, value);
            }
            ReconnectMessage::ViewDone => {}
            ReconnectMessage::Abort(reason) => buf.put_u8(abort_tag(reason)),
            ReconnectMessage::OpenView { target_view, path, virtual_range } => {
                buf.put_i64_le(*target_view);
                buf.put_u64_le(*path);
                match virtual_range {
                    Some((first, last)) => {
                        buf.put_u8(1);
                        buf.put_u64_le(*first);
                        buf.put_u64_le(*last);
                    }
                    None => buf.put_u8(0),
                }
            }
            ReconnectMessage::CloseView { target_view } => buf.put_i64_le(*target_view),
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, ReconnectError> {
        if bytes.remaining() < 1 {
            return Err(ReconnectError::Decode("empty reconnect message".into()));
        }
        match bytes.get_u8() {
            0 => {
                if bytes.remaining() < 9 {
                    return Err(ReconnectError::Decode("truncated node query".into()));
                }
                let path = bytes.get_u64_le();
                let known_hash = if bytes.get_u8() == 1 {
                    Some(get_hash(&mut bytes)?)
                } else {
                    None
                };
                Ok(ReconnectMessage::NodeQuery { path, known_hash })
            }
            1 => {
                if bytes.remaining() < 8 {
                    return Err(ReconnectError::Decode("truncated node clean".into()));
                }
                Ok(ReconnectMessage::NodeClean { path: bytes.get_u64_le() })
            }
            2 => {
                if bytes.remaining() < 8 + HASH_LEN + 1 {
                    return Err(ReconnectError::Decode("truncated node dirty".into()));
                }
                let path = bytes.get_u64_le();
                let hash = get_hash(&mut bytes)?;
                let content = match bytes.get_u8() {
                    0 => {
                        let key = get_bytes_field(&mut bytes, "leaf key")?;
                        let value = get_bytes_field(&mut bytes, "leaf value")?;
                        NodeContent::Leaf { key, value }
                    }
                    1 => {
                        let left_hash = get_hash(&mut bytes)?;
                        let right_hash = get_hash(&mut bytes)?;
                        NodeContent::Internal { left_hash, right_hash }
                    }
                    other => {
                        return Err(ReconnectError::Decode(format!(
                            "unknown node content tag {other}"
                        )))
                    }
                };
                Ok(ReconnectMessage::NodeDirty { path, hash, content })
            }
            3 => {
                if bytes.remaining() < 8 {
                    return Err(ReconnectError::Decode("truncated internal query".into()));
                }
                Ok(ReconnectMessage::InternalQuery { path: bytes.get_u64_le() })
            }
            4 => {
                if bytes.remaining() < 9 {
                    return Err(ReconnectError::Decode("truncated internal answer".into()));
                }
                let path = bytes.get_u64_le();
                let clean = bytes.get_u8() == 1;
                Ok(ReconnectMessage::InternalAnswer { path, clean })
            }
            5 => {
                if bytes.remaining() < 8 {
                    return Err(ReconnectError::Decode("truncated leaf query".into()));
                }
                Ok(ReconnectMessage::LeafQuery { path: bytes.get_u64_le() })
            }
            6 => {
                if bytes.remaining() < 9 {
                    return Err(ReconnectError::Decode("truncated leaf answer".into()));
                }
                let path = bytes.get_u64_le();
                let present = bytes.get_u8() == 1;
                let key = get_bytes_field(&mut bytes, "leaf answer key")?;
                let value = get_bytes_field(&mut bytes, "leaf answer value")?;
                Ok(ReconnectMessage::LeafAnswer { path, present, key, value })
            }
            7 => Ok(ReconnectMessage::ViewDone),
            8 => {
                if bytes.remaining() < 1 {
                    return Err(ReconnectError::Decode("truncated abort".into()));
                }
                Ok(ReconnectMessage::Abort(abort_from_tag(bytes.get_u8())))
            }
            9 => {
                if bytes.remaining() < 8 + 8 + 1 {
                    return Err(ReconnectError::Decode("truncated open view".into()));
                }
                let target_view = bytes.get_i64_le();
                let path = bytes.get_u64_le();
                let virtual_range = if bytes.get_u8() == 1 {
                    if bytes.remaining() < 16 {
                        return Err(ReconnectError::Decode("truncated open view range".into()));
                    }
                    let first = bytes.get_u64_le();
                    let last = bytes.get_u64_le();
                    Some((first, last))
                } else {
                    None
                };
                Ok(ReconnectMessage::OpenView { target_view, path, virtual_range })
            }
            10 => {
                if bytes.remaining() < 8 {
                    return Err(ReconnectError::Decode("truncated close view".into()));
                }
                Ok(ReconnectMessage::CloseView { target_view: bytes.get_i64_le() })
            }
            other => Err(ReconnectError::Decode(format!("unknown message tag {other}"))),
        }
    }
}
