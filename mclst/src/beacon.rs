//! The mclst-private beacon payload: a magic number, sequence, remote
//! timestamp and optional message, carried inside a sent UDP payload so a
//! receiver on the other end of a path can compute a one-way delta.
//!
//! Grounded on `apps/mclst/MclstBeaconHdr` in the original sources: a
//! fixed-layout header followed by `dataLen` bytes of message, all fields
//! big-endian on the wire (the original used host-endian ints with
//! `be64toh`/`be16toh` conversions at each end, which is equivalent to
//! transmitting big-endian).

/// `MclstMagic` from the original sources, as a big-endian 64-bit value.
pub const MAGIC: u64 = 0xA522_A4B5_BB1C_9250;

const HEADER_LEN: usize = 8 + 8 + 8 + 2;

/// A dissected beacon header plus a borrowed view of its message bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconHeader {
    pub seq: u64,
    pub time_ns: u64,
    pub data_len: u16,
}

/// Encodes a beacon payload: header followed by `message`, truncated or
/// zero-padded to nothing beyond `message`'s own length (`data_len` is
/// exactly `message.len()`).
pub fn encode(seq: u64, time_ns: u64, message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + message.len());
    buf.extend_from_slice(&MAGIC.to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&time_ns.to_be_bytes());
    buf.extend_from_slice(&(message.len() as u16).to_be_bytes());
    buf.extend_from_slice(message);
    buf
}

/// The outcome of attempting to dissect a beacon payload out of a UDP
/// datagram's data.
pub enum Dissected<'a> {
    /// The payload did not start with the beacon magic; not a beacon.
    NotABeacon,
    /// The header parsed and `data_len` bytes of message followed it.
    Beacon(BeaconHeader, &'a [u8]),
    /// The header parsed, but fewer than `data_len` bytes remained: the
    /// payload is truncated or corrupt.
    Truncated(BeaconHeader, usize),
}

/// Attempts to dissect a beacon header and message out of `payload`. Per
/// §4.6: if the magic matches but `data_len` exceeds what remains, the
/// caller should emit a warning and treat the packet as a plain, non-beacon
/// packet.
pub fn dissect(payload: &[u8]) -> Dissected<'_> {
    if payload.len() < HEADER_LEN {
        return Dissected::NotABeacon;
    }
    let magic = u64::from_be_bytes(payload[0..8].try_into().unwrap());
    if magic != MAGIC {
        return Dissected::NotABeacon;
    }
    let seq = u64::from_be_bytes(payload[8..16].try_into().unwrap());
    let time_ns = u64::from_be_bytes(payload[16..24].try_into().unwrap());
    let data_len = u16::from_be_bytes(payload[24..26].try_into().unwrap());
    let hdr = BeaconHeader {
        seq,
        time_ns,
        data_len,
    };

    let remaining = &payload[HEADER_LEN..];
    if remaining.len() < data_len as usize {
        return Dissected::Truncated(hdr, remaining.len());
    }
    Dissected::Beacon(hdr, &remaining[..data_len as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_dissects_round_trip() {
        let payload = encode(42, 123_456_789, b"hello");
        match dissect(&payload) {
            Dissected::Beacon(hdr, msg) => {
                assert_eq!(hdr.seq, 42);
                assert_eq!(hdr.time_ns, 123_456_789);
                assert_eq!(hdr.data_len, 5);
                assert_eq!(msg, b"hello");
            }
            _ => panic!("expected a beacon"),
        }
    }

    #[test]
    fn non_beacon_payload_is_rejected() {
        let payload = [0u8; 32];
        assert!(matches!(dissect(&payload), Dissected::NotABeacon));
    }

    #[test]
    fn truncated_message_is_reported() {
        let mut payload = encode(1, 1, b"0123456789");
        payload.truncate(HEADER_LEN + 3);
        match dissect(&payload) {
            Dissected::Truncated(hdr, remaining) => {
                assert_eq!(hdr.data_len, 10);
                assert_eq!(remaining, 3);
            }
            _ => panic!("expected truncation"),
        }
    }

    #[test]
    fn too_short_for_header_is_not_a_beacon() {
        assert!(matches!(dissect(&[1, 2, 3]), Dissected::NotABeacon));
    }
}
