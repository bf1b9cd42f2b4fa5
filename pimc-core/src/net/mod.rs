//! IPv4 address, prefix and interface primitives.

mod address;
mod intf;
mod prefix;

pub use address::{IPv4Address, InvalidMaskLength};
pub use intf::{IntfInfo, IntfTable};
pub use prefix::IPv4Prefix;
