//! Hello message body: a concatenation of `{type:u16, length:u16, value}`
//! options. Only the three options this emitter ever sends are supported.

const OPT_HOLDTIME: u16 = 1;
const OPT_DR_PRIORITY: u16 = 19;
const OPT_GENERATION_ID: u16 = 20;

fn push_option(buf: &mut Vec<u8>, opt_type: u16, value: &[u8]) {
    buf.extend_from_slice(&opt_type.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

/// Encodes the Hello body: Holdtime, DR-Priority, GenerationID, in that
/// order.
pub fn encode_hello_body(holdtime: u16, dr_priority: u32, generation_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20);
    push_option(&mut buf, OPT_HOLDTIME, &holdtime.to_be_bytes());
    push_option(&mut buf, OPT_DR_PRIORITY, &dr_priority.to_be_bytes());
    push_option(&mut buf, OPT_GENERATION_ID, &generation_id.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_three_options_in_order() {
        let body = encode_hello_body(105, 1, 0xDEAD_BEEF);
        assert_eq!(body.len(), 3 * 4 + 2 + 4 + 4);
        assert_eq!(&body[0..4], &[0, 1, 0, 2]);
        assert_eq!(&body[4..6], &105u16.to_be_bytes());
        assert_eq!(&body[6..10], &[0, 19, 0, 4]);
        assert_eq!(&body[10..14], &1u32.to_be_bytes());
        assert_eq!(&body[14..18], &[0, 20, 0, 4]);
        assert_eq!(&body[18..22], &0xDEAD_BEEFu32.to_be_bytes());
    }
}
