// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parsing and serialization of NDP Router Advertisement and Router
//! Solicitation messages, as defined by [RFC 4861] with the Route
//! Information Option extension of [RFC 4191].
//!
//! Messages are handled over bounded buffers of at most
//! [`MAX_RA_MESSAGE_LENGTH`] octets. ICMPv6 checksums are emitted as zero
//! and ignored on parse: the infrastructure interface socket owns
//! checksumming (it requires the IPv6 pseudo-header, which this layer never
//! sees).
//!
//! [RFC 4861]: https://datatracker.ietf.org/doc/html/rfc4861
//! [RFC 4191]: https://datatracker.ietf.org/doc/html/rfc4191

use zerocopy::byteorder::network_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use net_types::ip::Ipv6Addr;

use crate::prefix::Prefix;

/// The maximum length of a Router Advertisement message we handle, in either
/// direction.
pub const MAX_RA_MESSAGE_LENGTH: usize = 256;

pub(crate) const ICMP6_TYPE_ROUTER_SOLICIT: u8 = 133;
pub(crate) const ICMP6_TYPE_ROUTER_ADVERT: u8 = 134;

const OPTION_TYPE_PREFIX_INFO: u8 = 3;
const OPTION_TYPE_ROUTE_INFO: u8 = 24;

const PIO_FLAG_ON_LINK: u8 = 0x80;
const PIO_FLAG_AUTONOMOUS: u8 = 0x40;

// Route preference bits sit in bits 3-4 of the flags/reserved octet, both in
// the RA header (RFC 4191 section 2.2) and in the RIO (section 2.3).
const ROUTE_PREFERENCE_SHIFT: u8 = 3;
const ROUTE_PREFERENCE_MASK: u8 = 0b11;

/// An error while parsing a received message. The caller drops the message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The message or one of its options was cut short.
    #[error("message truncated")]
    Truncated,
    /// The message exceeds [`MAX_RA_MESSAGE_LENGTH`].
    #[error("message exceeds the maximum handled length")]
    TooLong,
    /// An option carried a length field of zero; nothing after it can be
    /// delimited (RFC 4861 section 4.6).
    #[error("option with zero length")]
    ZeroLengthOption,
    /// The ICMPv6 type or code did not match the expected message.
    #[error("unexpected ICMPv6 type or code")]
    UnexpectedType,
}

/// An error appending an option to a full message buffer. The option is
/// left out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("no space left in the message buffer")]
pub struct LengthError;

/// A route preference, totally ordered `Low < Medium < High` (RFC 4191).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RoutePreference {
    /// Low route preference.
    Low,
    /// Medium (default) route preference.
    Medium,
    /// High route preference.
    High,
}

impl RoutePreference {
    fn to_flag_bits(self) -> u8 {
        match self {
            RoutePreference::High => 0b01,
            RoutePreference::Medium => 0b00,
            RoutePreference::Low => 0b11,
        }
    }

    // `None` for the reserved (10) pattern.
    fn from_flag_bits(bits: u8) -> Option<RoutePreference> {
        match bits & ROUTE_PREFERENCE_MASK {
            0b01 => Some(RoutePreference::High),
            0b00 => Some(RoutePreference::Medium),
            0b11 => Some(RoutePreference::Low),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, KnownLayout, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct RaHeaderRepr {
    msg_type: u8,
    code: u8,
    checksum: U16,
    cur_hop_limit: u8,
    flags: u8,
    router_lifetime: U16,
    reachable_time: U32,
    retrans_timer: U32,
}

const RA_HEADER_LENGTH: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq, KnownLayout, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct RsHeaderRepr {
    msg_type: u8,
    code: u8,
    checksum: U16,
    reserved: [u8; 4],
}

/// The length of a Router Solicitation message without options.
pub const RS_MESSAGE_LENGTH: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq, KnownLayout, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct PioRepr {
    option_type: u8,
    option_length: u8,
    prefix_length: u8,
    flags: u8,
    valid_lifetime: U32,
    preferred_lifetime: U32,
    reserved: U32,
    prefix: [u8; 16],
}

const PIO_LENGTH: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq, KnownLayout, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct RioRepr {
    option_type: u8,
    option_length: u8,
    prefix_length: u8,
    flags: u8,
    route_lifetime: U32,
}

const RIO_FIXED_LENGTH: usize = 8;

/// The semantic content of a Router Advertisement header (RFC 4861 section
/// 4.2), minus the generic ICMPv6 fields.
///
/// `Default` is the "we never learned anything" header: all fields zero. The
/// `flags` octet is carried verbatim so a header learned from another
/// advertising daemon on this host round-trips unchanged.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouterAdvertHeader {
    /// The default hop limit to advertise, zero meaning unspecified.
    pub cur_hop_limit: u8,
    /// The raw flags octet (M, O and default route preference bits).
    pub flags: u8,
    /// The default router lifetime in seconds, zero meaning "not a default
    /// router".
    pub router_lifetime: u16,
    /// The advertised reachable time in milliseconds, zero meaning
    /// unspecified.
    pub reachable_time: u32,
    /// The advertised retransmission timer in milliseconds, zero meaning
    /// unspecified.
    pub retrans_timer: u32,
}

impl RouterAdvertHeader {
    /// The default router preference encoded in the flags octet.
    ///
    /// The reserved bit pattern is read as Medium, as required by RFC 4191
    /// section 2.2.
    pub fn default_route_preference(&self) -> RoutePreference {
        RoutePreference::from_flag_bits(self.flags >> ROUTE_PREFERENCE_SHIFT)
            .unwrap_or(RoutePreference::Medium)
    }
}

impl From<&RaHeaderRepr> for RouterAdvertHeader {
    fn from(repr: &RaHeaderRepr) -> RouterAdvertHeader {
        let RaHeaderRepr {
            msg_type: _,
            code: _,
            checksum: _,
            cur_hop_limit,
            flags,
            router_lifetime,
            reachable_time,
            retrans_timer,
        } = repr;
        RouterAdvertHeader {
            cur_hop_limit: *cur_hop_limit,
            flags: *flags,
            router_lifetime: router_lifetime.get(),
            reachable_time: reachable_time.get(),
            retrans_timer: retrans_timer.get(),
        }
    }
}

/// A Prefix Information Option (RFC 4861 section 4.6.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PrefixInfo {
    /// The advertised prefix, masked to its prefix length.
    pub prefix: Prefix,
    /// The L (on-link) flag.
    pub on_link: bool,
    /// The A (autonomous address-configuration) flag.
    pub autonomous: bool,
    /// The valid lifetime in seconds.
    pub valid_lifetime: u32,
    /// The preferred lifetime in seconds.
    pub preferred_lifetime: u32,
}

/// A Route Information Option (RFC 4191 section 2.3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RouteInfo {
    /// The advertised route prefix, masked to its prefix length.
    pub prefix: Prefix,
    /// The route preference.
    pub preference: RoutePreference,
    /// The route lifetime in seconds.
    pub route_lifetime: u32,
}

/// An NDP option recognized by this crate. Options of other types are
/// skipped over by length.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NdpOption {
    /// A Prefix Information Option.
    PrefixInfo(PrefixInfo),
    /// A Route Information Option.
    RouteInfo(RouteInfo),
}

// Checks that the TLV structure delimits the whole buffer. Option bodies are
// validated lazily by the iterator; an undecodable body only drops that
// option, but a broken TLV structure drops the message.
fn validate_options(mut bytes: &[u8]) -> Result<(), ParseError> {
    while !bytes.is_empty() {
        if bytes.len() < 2 {
            return Err(ParseError::Truncated);
        }
        let len = usize::from(bytes[1]) * 8;
        if len == 0 {
            return Err(ParseError::ZeroLengthOption);
        }
        if bytes.len() < len {
            return Err(ParseError::Truncated);
        }
        bytes = &bytes[len..];
    }
    Ok(())
}

/// A parsed Router Advertisement message borrowing the received buffer.
pub struct RouterAdvertMessage<'a> {
    header: RouterAdvertHeader,
    options: &'a [u8],
}

impl<'a> RouterAdvertMessage<'a> {
    /// Parses a Router Advertisement from `packet` (the full ICMPv6
    /// message).
    pub fn parse(packet: &'a [u8]) -> Result<RouterAdvertMessage<'a>, ParseError> {
        if packet.len() > MAX_RA_MESSAGE_LENGTH {
            return Err(ParseError::TooLong);
        }
        let (repr, options) =
            RaHeaderRepr::read_from_prefix(packet).map_err(|_| ParseError::Truncated)?;
        if repr.msg_type != ICMP6_TYPE_ROUTER_ADVERT || repr.code != 0 {
            return Err(ParseError::UnexpectedType);
        }
        validate_options(options)?;
        Ok(RouterAdvertMessage { header: RouterAdvertHeader::from(&repr), options })
    }

    /// The message header.
    pub fn header(&self) -> &RouterAdvertHeader {
        &self.header
    }

    /// Iterates over the recognized options, silently skipping unknown types
    /// and options whose bodies fail their own validity rules.
    pub fn options(&self) -> impl Iterator<Item = NdpOption> + 'a {
        NdpOptionsIter { bytes: self.options }
    }
}

struct NdpOptionsIter<'a> {
    bytes: &'a [u8],
}

impl Iterator for NdpOptionsIter<'_> {
    type Item = NdpOption;

    fn next(&mut self) -> Option<NdpOption> {
        while !self.bytes.is_empty() {
            // The TLV structure was validated up front.
            let len = usize::from(self.bytes[1]) * 8;
            let (option, rest) = self.bytes.split_at(len);
            self.bytes = rest;
            if let Some(option) = parse_option(option) {
                return Some(option);
            }
        }
        None
    }
}

fn parse_option(option: &[u8]) -> Option<NdpOption> {
    match option[0] {
        OPTION_TYPE_PREFIX_INFO => {
            // A PIO is exactly 4 units long; `read_from_bytes` fails on any
            // other size.
            let repr = PioRepr::read_from_bytes(option).ok()?;
            if repr.prefix_length > 128 {
                return None;
            }
            Some(NdpOption::PrefixInfo(PrefixInfo {
                prefix: Prefix::new(Ipv6Addr::from_bytes(repr.prefix), repr.prefix_length),
                on_link: repr.flags & PIO_FLAG_ON_LINK != 0,
                autonomous: repr.flags & PIO_FLAG_AUTONOMOUS != 0,
                valid_lifetime: repr.valid_lifetime.get(),
                preferred_lifetime: repr.preferred_lifetime.get(),
            }))
        }
        OPTION_TYPE_ROUTE_INFO => {
            let (repr, prefix_bytes) = RioRepr::read_from_prefix(option).ok()?;
            // 8, 16 or 24 octets; the truncated prefix must cover the prefix
            // length (RFC 4191 section 2.3).
            if option.len() > 24
                || repr.prefix_length > 128
                || usize::from(repr.prefix_length) > prefix_bytes.len() * 8
            {
                return None;
            }
            // A reserved preference means the RIO MUST be ignored.
            let preference =
                RoutePreference::from_flag_bits(repr.flags >> ROUTE_PREFERENCE_SHIFT)?;
            let mut bytes = [0; 16];
            bytes[..prefix_bytes.len()].copy_from_slice(prefix_bytes);
            Some(NdpOption::RouteInfo(RouteInfo {
                prefix: Prefix::new(Ipv6Addr::from_bytes(bytes), repr.prefix_length),
                preference,
                route_lifetime: repr.route_lifetime.get(),
            }))
        }
        _ => None,
    }
}

/// Validates a received Router Solicitation (RFC 4861 section 4.1). The
/// contents carry no information this crate uses; only well-formedness
/// matters.
pub fn parse_router_solicit(packet: &[u8]) -> Result<(), ParseError> {
    if packet.len() > MAX_RA_MESSAGE_LENGTH {
        return Err(ParseError::TooLong);
    }
    let (repr, options) =
        RsHeaderRepr::read_from_prefix(packet).map_err(|_| ParseError::Truncated)?;
    if repr.msg_type != ICMP6_TYPE_ROUTER_SOLICIT || repr.code != 0 {
        return Err(ParseError::UnexpectedType);
    }
    validate_options(options)
}

/// Builds a Router Solicitation message with no options.
pub fn new_router_solicit_message() -> [u8; RS_MESSAGE_LENGTH] {
    let mut message = [0; RS_MESSAGE_LENGTH];
    message[0] = ICMP6_TYPE_ROUTER_SOLICIT;
    message
}

/// An outgoing Router Advertisement under construction, backed by a
/// fixed-size buffer of [`MAX_RA_MESSAGE_LENGTH`] octets.
pub struct RouterAdvertBuilder {
    buffer: [u8; MAX_RA_MESSAGE_LENGTH],
    len: usize,
}

impl RouterAdvertBuilder {
    /// Starts a message with the given header. The checksum field is written
    /// as zero.
    pub fn new(header: &RouterAdvertHeader) -> RouterAdvertBuilder {
        let RouterAdvertHeader {
            cur_hop_limit,
            flags,
            router_lifetime,
            reachable_time,
            retrans_timer,
        } = header;
        let repr = RaHeaderRepr {
            msg_type: ICMP6_TYPE_ROUTER_ADVERT,
            code: 0,
            checksum: U16::new(0),
            cur_hop_limit: *cur_hop_limit,
            flags: *flags,
            router_lifetime: U16::new(*router_lifetime),
            reachable_time: U32::new(*reachable_time),
            retrans_timer: U32::new(*retrans_timer),
        };
        let mut buffer = [0; MAX_RA_MESSAGE_LENGTH];
        buffer[..RA_HEADER_LENGTH].copy_from_slice(repr.as_bytes());
        RouterAdvertBuilder { buffer, len: RA_HEADER_LENGTH }
    }

    /// Appends a Prefix Information Option.
    pub fn append_prefix_info(&mut self, pio: &PrefixInfo) -> Result<(), LengthError> {
        let PrefixInfo { prefix, on_link, autonomous, valid_lifetime, preferred_lifetime } = pio;
        let mut flags = 0;
        if *on_link {
            flags |= PIO_FLAG_ON_LINK;
        }
        if *autonomous {
            flags |= PIO_FLAG_AUTONOMOUS;
        }
        let repr = PioRepr {
            option_type: OPTION_TYPE_PREFIX_INFO,
            option_length: (PIO_LENGTH / 8) as u8,
            prefix_length: prefix.length(),
            flags,
            valid_lifetime: U32::new(*valid_lifetime),
            preferred_lifetime: U32::new(*preferred_lifetime),
            reserved: U32::new(0),
            prefix: prefix.bytes(),
        };
        self.append_bytes(repr.as_bytes())
    }

    /// Appends a Route Information Option, using the smallest encoding that
    /// covers the prefix length.
    pub fn append_route_info(&mut self, rio: &RouteInfo) -> Result<(), LengthError> {
        let RouteInfo { prefix, preference, route_lifetime } = rio;
        let prefix_octets: usize = match prefix.length() {
            0 => 0,
            1..=64 => 8,
            _ => 16,
        };
        let repr = RioRepr {
            option_type: OPTION_TYPE_ROUTE_INFO,
            option_length: ((RIO_FIXED_LENGTH + prefix_octets) / 8) as u8,
            prefix_length: prefix.length(),
            flags: preference.to_flag_bits() << ROUTE_PREFERENCE_SHIFT,
            route_lifetime: U32::new(*route_lifetime),
        };
        let end = self.len.checked_add(RIO_FIXED_LENGTH + prefix_octets).unwrap();
        if end > MAX_RA_MESSAGE_LENGTH {
            return Err(LengthError);
        }
        self.append_bytes(repr.as_bytes())?;
        self.append_bytes(&prefix.bytes()[..prefix_octets])
    }

    /// Whether any option has been appended since construction.
    pub fn contains_any_options(&self) -> bool {
        self.len > RA_HEADER_LENGTH
    }

    /// The serialized message.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), LengthError> {
        let end = self.len.checked_add(bytes.len()).unwrap();
        if end > MAX_RA_MESSAGE_LENGTH {
            return Err(LengthError);
        }
        self.buffer[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }
}
