//! Bit-exact PIM-SM v2 wire encoding: common header, encoded addresses,
//! Hello options and the Join/Prune message body.
//!
//! Grounded on `lib/net/PIMProto.hpp`, which defines the on-wire structs
//! this module mirrors field-for-field.

mod encoded;
mod header;
mod hello;
mod joinprune;

pub use encoded::{EncodedGroupAddr, EncodedSourceAddr, EncodedUnicastAddr, SourceFlags};
pub use header::{checksum, finalize_packet, PimMessageType};
pub use hello::encode_hello_body;
pub use joinprune::encode_joinprune_body;
