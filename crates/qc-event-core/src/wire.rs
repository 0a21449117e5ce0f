//! Deterministic length-prefixed event wire encoding, spec.md §6: "Event
//! wire format": creator, parents list (each a descriptor triple {hash
//! bytes, creator, birth_round}), timestamp (seconds + nanos), transactions
//! (length-prefixed payloads), birth round, signature (48 or 64 bytes),
//! hash (48 bytes SHA-384 default). No framing bytes beyond this.
//!
//! Parent triples on the wire carry only {hash, creator, birth_round} —
//! generation is derived, not transmitted; the receiver resolves it by
//! looking the parent up in its own shadow graph (spec.md §3 invariant).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared_types::{Hash, NodeId, Timestamp, HASH_LEN};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of buffer decoding field '{field}'")]
    Truncated { field: &'static str },

    #[error("signature length {len} is neither 48 nor 64 bytes")]
    BadSignatureLength { len: usize },
}

/// A parent reference as it appears on the wire: no `generation` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireParent {
    pub hash: Hash,
    pub creator: NodeId,
    pub birth_round: u64,
}

/// The subset of an event's fields the wire format carries, independent of
/// the in-process `Event` representation so `qc-event-core::event` stays
/// decoupled from the exact byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    pub creator: NodeId,
    pub self_parent: Option<WireParent>,
    pub other_parents: Vec<WireParent>,
    pub timestamp: Timestamp,
    pub transactions: Vec<Vec<u8>>,
    pub birth_round: u64,
    /// Present only once the event has been signed and hashed.
    pub signature: Option<Vec<u8>>,
    pub hash: Option<Hash>,
}

fn put_parent(buf: &mut BytesMut, parent: &WireParent) {
    buf.put_slice(parent.hash.as_bytes());
    buf.put_u64_le(parent.creator.as_u64());
    buf.put_u64_le(parent.birth_round);
}

fn get_parent(buf: &mut Bytes) -> Result<WireParent, WireError> {
    if buf.remaining() < HASH_LEN + 16 {
        return Err(WireError::Truncated { field: "parent" });
    }
    let mut hash_bytes = [0u8; HASH_LEN];
    buf.copy_to_slice(&mut hash_bytes);
    let creator = NodeId::new(buf.get_u64_le());
    let birth_round = buf.get_u64_le();
    Ok(WireParent {
        hash: Hash::from_bytes(hash_bytes),
        creator,
        birth_round,
    })
}

/// Encodes every field the hash covers: everything except `signature` and
/// `hash` themselves (spec.md §4.1 "The hash covers all fields except the
/// signature and any derived metadata").
pub fn encode_unsigned(event: &WireEvent) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u64_le(event.creator.as_u64());

    match &event.self_parent {
        Some(p) => {
            buf.put_u8(1);
            put_parent(&mut buf, p);
        }
        None => buf.put_u8(0),
    }

    buf.put_u32_le(event.other_parents.len() as u32);
    for p in &event.other_parents {
        put_parent(&mut buf, p);
    }

    let nanos = event.timestamp.as_nanos();
    let seconds = (nanos / 1_000_000_000) as i64;
    let sub_nanos = (nanos % 1_000_000_000) as u32;
    buf.put_i64_le(seconds);
    buf.put_u32_le(sub_nanos);

    buf.put_u32_le(event.transactions.len() as u32);
    for tx in &event.transactions {
        buf.put_u32_le(tx.len() as u32);
        buf.put_slice(tx);
    }

    buf.put_u64_le(event.birth_round);
    buf.to_vec()
}

/// Full wire encoding including signature and hash, for transfer over a
/// gossip or reconnect session (spec.md §6 "Gossip frame" payload).
pub fn encode_signed(event: &WireEvent) -> Vec<u8> {
    let mut out = encode_unsigned(event);
    let signature = event
        .signature
        .as_ref()
        .expect("encode_signed requires a signed event");
    let hash = event.hash.expect("encode_signed requires a hashed event");
    out.push(signature.len() as u8);
    out.extend_from_slice(signature);
    out.extend_from_slice(hash.as_bytes());
    out
}

/// Decodes a full signed wire event.
pub fn decode_signed(bytes: &[u8]) -> Result<WireEvent, WireError> {
    let mut buf = Bytes::copy_from_slice(bytes);

    if buf.remaining() < 8 {
        return Err(WireError::Truncated { field: "creator" });
    }
    let creator = NodeId::new(buf.get_u64_le());

    if buf.remaining() < 1 {
        return Err(WireError::Truncated {
            field: "has_self_parent",
        });
    }
    let self_parent = if buf.get_u8() == 1 {
        Some(get_parent(&mut buf)?)
    } else {
        None
    };

    if buf.remaining() < 4 {
        return Err(WireError::Truncated {
            field: "other_parents_count",
        });
    }
    let other_count = buf.get_u32_le() as usize;
    let mut other_parents = Vec::with_capacity(other_count);
    for _ in 0..other_count {
        other_parents.push(get_parent(&mut buf)?);
    }

    if buf.remaining() < 12 {
        return Err(WireError::Truncated { field: "timestamp" });
    }
    let seconds = buf.get_i64_le();
    let sub_nanos = buf.get_u32_le();
    let nanos = (seconds as i128 * 1_000_000_000 + sub_nanos as i128) as u128;
    let timestamp = Timestamp::from_nanos(nanos);

    if buf.remaining() < 4 {
        return Err(WireError::Truncated {
            field: "transactions_count",
        });
    }
    let tx_count = buf.get_u32_le() as usize;
    let mut transactions = Vec::with_capacity(tx_count);
    for _ in 0..tx_count {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated { field: "tx_len" });
        }
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(WireError::Truncated { field: "tx_bytes" });
        }
        let mut tx = vec![0u8; len];
        buf.copy_to_slice(&mut tx);
        transactions.push(tx);
    }

    if buf.remaining() < 8 {
        return Err(WireError::Truncated { field: "birth_round" });
    }
    let birth_round = buf.get_u64_le();

    if buf.remaining() < 1 {
        return Err(WireError::Truncated {
            field: "signature_len",
        });
    }
    let sig_len = buf.get_u8() as usize;
    if sig_len != 48 && sig_len != 64 {
        return Err(WireError::BadSignatureLength { len: sig_len });
    }
    if buf.remaining() < sig_len {
        return Err(WireError::Truncated { field: "signature" });
    }
    let mut signature = vec![0u8; sig_len];
    buf.copy_to_slice(&mut signature);

    if buf.remaining() < HASH_LEN {
        return Err(WireError::Truncated { field: "hash" });
    }
    let mut hash_bytes = [0u8; HASH_LEN];
    buf.copy_to_slice(&mut hash_bytes);

    Ok(WireEvent {
        creator,
        self_parent,
        other_parents,
        timestamp,
        transactions,
        birth_round,
        signature: Some(signature),
        hash: Some(Hash::from_bytes(hash_bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WireEvent {
        WireEvent {
            creator: NodeId::new(3),
            self_parent: Some(WireParent {
                hash: Hash::from_bytes([9u8; HASH_LEN]),
                creator: NodeId::new(3),
                birth_round: 4,
            }),
            other_parents: vec![WireParent {
                hash: Hash::from_bytes([7u8; HASH_LEN]),
                creator: NodeId::new(1),
                birth_round: 5,
            }],
            timestamp: Timestamp::from_nanos(1_700_000_000_123_456_789),
            transactions: vec![b"tx-one".to_vec(), b"tx-two".to_vec()],
            birth_round: 5,
            signature: Some(vec![0xAB; 64]),
            hash: Some(Hash::from_bytes([0xCDu8; HASH_LEN])),
        }
    }

    #[test]
    fn round_trips_signed_event() {
        let original = sample();
        let encoded = encode_signed(&original);
        let decoded = decode_signed(&encoded).unwrap();

        assert_eq!(decoded.creator, original.creator);
        assert_eq!(decoded.self_parent, original.self_parent);
        assert_eq!(decoded.other_parents, original.other_parents);
        assert_eq!(decoded.timestamp, original.timestamp);
        assert_eq!(decoded.transactions, original.transactions);
        assert_eq!(decoded.birth_round, original.birth_round);
        assert_eq!(decoded.signature, original.signature);
        assert_eq!(decoded.hash, original.hash);
    }

    #[test]
    fn genesis_event_has_no_self_parent() {
        let mut original = sample();
        original.self_parent = None;
        let encoded = encode_signed(&original);
        let decoded = decode_signed(&encoded).unwrap();
        assert!(decoded.self_parent.is_none());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let encoded = encode_signed(&sample());
        let truncated = &encoded[..encoded.len() - 10];
        assert!(decode_signed(truncated).is_err());
    }

    #[test]
    fn unsigned_encoding_excludes_signature_and_hash() {
        let event = sample();
        let unsigned = encode_unsigned(&event);
        let signed = encode_signed(&event);
        assert!(signed.len() > unsigned.len());
        assert_eq!(&signed[..unsigned.len()], unsigned.as_slice());
    }
}
