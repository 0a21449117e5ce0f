//! Frame payload encoding: "descriptor lists, event records, or control
//! frames ({tips, ack, abort_reason})" (spec.md §6).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use qc_event_core::wire::{decode_signed, encode_signed, WireEvent};
use shared_types::{Hash, NodeId, HASH_LEN};

use crate::error::{AbortReason, GossipError};

/// One creator's advertised tip, as exchanged during `TIP_EXCHANGE`
/// (spec.md §4.5): enough to diff against the local shadow graph without
/// shipping the whole event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipAdvert {
    pub creator: NodeId,
    pub hash: Hash,
    pub generation: u64,
    pub birth_round: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `HANDSHAKE`: roster epoch and software version (spec.md §4.5).
    Hello { roster_epoch: u64, software_version: u32 },
    /// `TIP_EXCHANGE`: this side's current per-creator tips.
    Tips(Vec<TipAdvert>),
    /// `TRANSFER`: one signed event, in the sender's topological order.
    Event(WireEvent),
    /// `TRANSFER -> COMMIT`: acknowledges the peer's stream has drained.
    Ack,
    /// Terminal failure, carrying why.
    Abort(AbortReason),
}

fn abort_tag(reason: &AbortReason) -> u8 {
    match reason {
        AbortReason::EpochMismatch { .. } => 0,
        AbortReason::ProtocolViolation => 1,
        AbortReason::Timeout => 2,
        AbortReason::InvalidEvent => 3,
        AbortReason::OperatorCancelled => 4,
        AbortReason::Transport(_) => 5,
    }
}

impl Payload {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Payload::Hello {
                roster_epoch,
                software_version,
            } => {
                buf.put_u8(0);
                buf.put_u64_le(*roster_epoch);
                buf.put_u32_le(*software_version);
            }
            Payload::Tips(tips) => {
                buf.put_u8(1);
                buf.put_u32_le(tips.len() as u32);
                for tip in tips {
                    buf.put_u64_le(tip.creator.as_u64());
                    buf.put_slice(tip.hash.as_bytes());
                    buf.put_u64_le(tip.generation);
                    buf.put_u64_le(tip.birth_round);
                }
            }
            Payload::Event(event) => {
                buf.put_u8(2);
                buf.put_slice(&encode_signed(event));
            }
            Payload::Ack => {
                buf.put_u8(3);
            }
            Payload::Abort(reason) => {
                buf.put_u8(4);
                buf.put_u8(abort_tag(reason));
                match reason {
                    AbortReason::EpochMismatch { ours, theirs } => {
                        buf.put_u64_le(*ours);
                        buf.put_u64_le(*theirs);
                    }
                    _ => {}
                }
            }
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, GossipError> {
        if bytes.remaining() < 1 {
            return Err(GossipError::Decode("empty payload".into()));
        }
        match bytes.get_u8() {
            0 => {
                if bytes.remaining() < 12 {
                    return Err(GossipError::Decode("truncated hello".into()));
                }
                Ok(Payload::Hello {
                    roster_epoch: bytes.get_u64_le(),
                    software_version: bytes.get_u32_le(),
                })
            }
            1 => {
                if bytes.remaining() < 4 {
                    return Err(GossipError::Decode("truncated tips count".into()));
                }
                let count = bytes.get_u32_le() as usize;
                let mut tips = Vec::with_capacity(count);
                for _ in 0..count {
                    if bytes.remaining() < 8 + HASH_LEN + 16 {
                        return Err(GossipError::Decode("truncated tip".into()));
                    }
                    let creator = NodeId::new(bytes.get_u64_le());
                    let mut hash_bytes = [0u8; HASH_LEN];
                    bytes.copy_to_slice(&mut hash_bytes);
                    let generation = bytes.get_u64_le();
                    let birth_round = bytes.get_u64_le();
                    tips.push(TipAdvert {
                        creator,
                        hash: Hash::from_bytes(hash_bytes),
                        generation,
                        birth_round,
                    });
                }
                Ok(Payload::Tips(tips))
            }
            2 => Ok(Payload::Event(decode_signed(&bytes)?)),
            3 => Ok(Payload::Ack),
            4 => {
                if bytes.remaining() < 1 {
                    return Err(GossipError::Decode("truncated abort".into()));
                }
                let reason = match bytes.get_u8() {
                    0 => {
                        if bytes.remaining() < 16 {
                            return Err(GossipError::Decode("truncated epoch mismatch".into()));
                        }
                        AbortReason::EpochMismatch {
                            ours: bytes.get_u64_le(),
                            theirs: bytes.get_u64_le(),
                        }
                    }
                    1 => AbortReason::ProtocolViolation,
                    2 => AbortReason::Timeout,
                    3 => AbortReason::InvalidEvent,
                    4 => AbortReason::OperatorCancelled,
                    _ => AbortReason::Transport(crate::error::TransportFailureKind::Io),
                };
                Ok(Payload::Abort(reason))
            }
            other => Err(GossipError::Decode(format!("unknown payload tag {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let p = Payload::Hello {
            roster_epoch: 7,
            software_version: 42,
        };
        assert_eq!(Payload::decode(p.encode()).unwrap(), p);
    }

    #[test]
    fn tips_round_trip() {
        let p = Payload::Tips(vec![TipAdvert {
            creator: NodeId::new(3),
            hash: Hash::from_bytes([9u8; HASH_LEN]),
            generation: 5,
            birth_round: 2,
        }]);
        assert_eq!(Payload::decode(p.encode()).unwrap(), p);
    }

    #[test]
    fn ack_round_trips() {
        assert_eq!(Payload::decode(Payload::Ack.encode()).unwrap(), Payload::Ack);
    }

    #[test]
    fn abort_round_trips() {
        let p = Payload::Abort(AbortReason::EpochMismatch { ours: 1, theirs: 2 });
        assert_eq!(Payload::decode(p.encode()).unwrap(), p);
    }
}
