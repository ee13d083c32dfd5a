// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! IPv6 prefixes: classification, validation and random generation.

use core::cmp::Ordering;
use core::fmt::{self, Debug, Display, Formatter};

use net_types::ip::Ipv6Addr;
use rand::RngCore;

/// The length, in bits, of an OMR or on-link prefix.
pub const OMR_PREFIX_LENGTH: u8 = 64;

/// The length, in bits, of a BR ULA prefix.
pub const BR_ULA_PREFIX_LENGTH: u8 = 48;

/// The length, in bits, of a NAT64 prefix.
pub const NAT64_PREFIX_LENGTH: u8 = 96;

// The first byte of a locally assigned ULA (the `fd00::/8` half of
// `fc00::/7`, with the L bit set).
const ULA_LOCAL_PREFIX_BYTE: u8 = 0xfd;

/// An IPv6 prefix: an address and a prefix length in `[0, 128]`.
///
/// The address is kept in canonical form: bits past the prefix length are
/// always zero. [`Prefix::new`] masks them, so prefixes parsed off the wire
/// compare equal regardless of what trailing garbage they carried.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Prefix {
    network: Ipv6Addr,
    length: u8,
}

impl Prefix {
    /// Creates a new prefix, masking address bits beyond `length`.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds 128.
    pub fn new(network: Ipv6Addr, length: u8) -> Prefix {
        assert!(length <= 128, "invalid prefix length {}", length);

        let mut bytes = network.ipv6_bytes();
        let full_bytes = usize::from(length / 8);
        if length % 8 != 0 {
            bytes[full_bytes] &= 0xffu8 << (8 - length % 8);
        }
        for byte in bytes.iter_mut().skip(full_bytes + usize::from(length % 8 != 0)) {
            *byte = 0;
        }

        Prefix { network: Ipv6Addr::from_bytes(bytes), length }
    }

    /// The zero-length `::/0` prefix matching every destination.
    pub fn default_route() -> Prefix {
        Prefix::new(Ipv6Addr::from_bytes([0; 16]), 0)
    }

    /// The network address, with all host bits zero.
    pub fn network(&self) -> Ipv6Addr {
        self.network
    }

    /// The prefix length in bits.
    pub fn length(&self) -> u8 {
        self.length
    }

    /// The network address as raw octets.
    pub fn bytes(&self) -> [u8; 16] {
        self.network.ipv6_bytes()
    }

    /// Whether the prefix is within `fe80::/10`.
    pub fn is_link_local(&self) -> bool {
        let bytes = self.bytes();
        self.length >= 10 && bytes[0] == 0xfe && (bytes[1] & 0xc0) == 0x80
    }

    /// Whether the prefix is within `ff00::/8`.
    pub fn is_multicast(&self) -> bool {
        self.length >= 8 && self.bytes()[0] == 0xff
    }

    /// Whether the prefix is within the ULA space `fc00::/7` (RFC 4193).
    pub fn is_unique_local(&self) -> bool {
        self.length >= 7 && (self.bytes()[0] & 0xfe) == 0xfc
    }

    /// Whether the prefix is within the global unicast space `2000::/3`.
    pub fn is_global_unicast(&self) -> bool {
        self.length >= 3 && (self.bytes()[0] & 0xe0) == 0x20
    }

    /// Whether the network address is all zeroes.
    pub fn is_unspecified(&self) -> bool {
        self.bytes() == [0; 16]
    }

    /// Whether this is a valid OMR prefix: a /64 GUA or ULA prefix which is
    /// not link-local, multicast or unspecified.
    pub fn is_valid_omr(&self) -> bool {
        self.length == OMR_PREFIX_LENGTH
            && (self.is_global_unicast() || self.is_unique_local())
            && !self.is_link_local()
            && !self.is_multicast()
            && !self.is_unspecified()
    }

    /// Whether this is a valid on-link prefix: a /64 prefix which is not
    /// link-local or multicast.
    ///
    /// A prefix carried in a PIO must additionally satisfy the option-level
    /// checks (autonomous flag, non-zero preferred lifetime); those are made
    /// where the option is processed since they are not properties of the
    /// prefix.
    pub fn is_valid_on_link(&self) -> bool {
        self.length == OMR_PREFIX_LENGTH && !self.is_link_local() && !self.is_multicast()
    }

    /// Whether this is a valid BR ULA prefix: a locally assigned ULA /48.
    pub fn is_valid_br_ula(&self) -> bool {
        self.length == BR_ULA_PREFIX_LENGTH && self.bytes()[0] == ULA_LOCAL_PREFIX_BYTE
    }

    /// Whether this is a valid NAT64 prefix: a /96 prefix which is not
    /// link-local or multicast.
    pub fn is_valid_nat64(&self) -> bool {
        self.length == NAT64_PREFIX_LENGTH && !self.is_link_local() && !self.is_multicast()
    }

    /// Derives a sub-prefix of `length` bits by writing `subnet_id` into the
    /// two bytes following this /48 prefix.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not 48 bits long or `length` is not at least 64.
    pub fn with_subnet_id(&self, subnet_id: u16, length: u8) -> Prefix {
        assert_eq!(self.length, BR_ULA_PREFIX_LENGTH);
        assert!(length >= OMR_PREFIX_LENGTH);

        let mut bytes = self.bytes();
        bytes[6..8].copy_from_slice(&subnet_id.to_be_bytes());
        Prefix::new(Ipv6Addr::from_bytes(bytes), length)
    }
}

impl Ord for Prefix {
    // Network bytes first, length as tiebreaker. Since the trailing bits are
    // canonically zero this is a total order agreeing with numeric order of
    // the prefix bits, and it is the order used for all "numerically
    // smaller" tie-breaks so that independent Border Routers converge on
    // identical choices.
    fn cmp(&self, other: &Prefix) -> Ordering {
        self.bytes().cmp(&other.bytes()).then(self.length.cmp(&other.length))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Prefix) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Prefix { network, length } = self;
        write!(f, "{}/{}", network, length)
    }
}

impl Debug for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Generates a random locally assigned ULA /48: `fd` followed by 40 random
/// bits.
pub fn generate_random_br_ula_prefix<R: RngCore>(rng: &mut R) -> Prefix {
    let mut bytes = [0; 16];
    bytes[0] = ULA_LOCAL_PREFIX_BYTE;
    rng.fill_bytes(&mut bytes[1..6]);
    Prefix::new(Ipv6Addr::from_bytes(bytes), BR_ULA_PREFIX_LENGTH)
}

/// Generates a random on-link /64 within the locally assigned ULA space:
/// `fd` followed by 56 random bits.
pub fn generate_random_on_link_prefix<R: RngCore>(rng: &mut R) -> Prefix {
    let mut bytes = [0; 16];
    bytes[0] = ULA_LOCAL_PREFIX_BYTE;
    rng.fill_bytes(&mut bytes[1..8]);
    Prefix::new(Ipv6Addr::from_bytes(bytes), OMR_PREFIX_LENGTH)
}
