//! IPv4 prefix value type, grounded on `lib/pimc/net/IPv4Prefix.hpp`.

use std::cmp::Ordering;
use std::fmt;

use super::address::{IPv4Address, InvalidMaskLength};

/// An IPv4 address/length pair, normalized so the address never carries
/// host bits beyond its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IPv4Prefix {
    address: IPv4Address,
    length: u32,
}

impl IPv4Prefix {
    /// Constructs a prefix, masking `address` down to `length` bits.
    pub fn new(address: IPv4Address, length: u32) -> Result<Self, InvalidMaskLength> {
        if length > 32 {
            return Err(InvalidMaskLength(length));
        }
        let mask = IPv4Address::mask_value(length);
        Ok(IPv4Prefix {
            address: IPv4Address::from_value(address.value() & mask),
            length,
        })
    }

    pub const fn address(self) -> IPv4Address {
        self.address
    }

    pub const fn length(self) -> u32 {
        self.length
    }

    /// True if `self` strictly contains `other`, i.e. `other` falls inside
    /// `self`'s range and `self` is strictly shorter.
    pub fn contains(self, other: IPv4Prefix) -> bool {
        if self.length >= other.length {
            return false;
        }
        let mask = IPv4Address::mask_value(self.length);
        (other.address.value() & mask) == self.address.value()
    }
}

impl PartialOrd for IPv4Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IPv4Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address
            .cmp(&other.address)
            .then(self.length.cmp(&other.length))
    }
}

impl fmt::Display for IPv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_masks_host_bits() {
        let p = IPv4Prefix::new(IPv4Address::new(192, 0, 2, 200), 24).unwrap();
        assert_eq!(p.address(), IPv4Address::new(192, 0, 2, 0));
    }

    #[test]
    fn ordering_is_address_then_length() {
        let a = IPv4Prefix::new(IPv4Address::new(10, 0, 0, 0), 8).unwrap();
        let b = IPv4Prefix::new(IPv4Address::new(10, 0, 0, 0), 16).unwrap();
        assert!(a < b);
    }

    #[test]
    fn shorter_strictly_contains_longer() {
        let outer = IPv4Prefix::new(IPv4Address::new(10, 0, 0, 0), 8).unwrap();
        let inner = IPv4Prefix::new(IPv4Address::new(10, 1, 2, 0), 24).unwrap();
        assert!(outer.contains(inner));
        assert!(!inner.contains(outer));
        assert!(!outer.contains(outer));
    }
}
