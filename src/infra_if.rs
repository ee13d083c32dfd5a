// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The infrastructure network interface adapter.
//!
//! The ICMPv6 socket on the infrastructure link (opening it, joining the
//! all-routers group, checksumming, hop-limit enforcement) lives behind
//! [`InfraIfContext`]; the core only ever sees octet buffers.

use net_types::ip::Ipv6Addr;

/// An error transmitting a message on the infrastructure interface. Failed
/// Router Solicitations are retried on a delay; failed Router Advertisements
/// are covered by the periodic schedule.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("failed to transmit on the infrastructure interface")]
pub struct SendError;

/// A context providing transmission on the infrastructure interface.
pub trait InfraIfContext {
    /// Sends an ICMPv6 neighbor discovery message to `dst`.
    ///
    /// `packet` is the full ICMPv6 message, at most
    /// [`MAX_RA_MESSAGE_LENGTH`] octets, with a zero checksum for the
    /// implementation to fill in.
    ///
    /// [`MAX_RA_MESSAGE_LENGTH`]: crate::ndp::MAX_RA_MESSAGE_LENGTH
    fn send_icmp6_nd(&mut self, packet: &[u8], dst: Ipv6Addr) -> Result<(), SendError>;

    /// Whether `addr` is assigned to the infrastructure interface itself.
    ///
    /// Used to recognize Router Advertisements initiated by another daemon
    /// on this same host, whose header fields we adopt.
    fn has_address(&self, addr: &Ipv6Addr) -> bool;
}

/// The all-nodes link-local multicast group, destination of Router
/// Advertisements.
pub(crate) fn all_nodes_multicast() -> Ipv6Addr {
    Ipv6Addr::new([0xff02, 0, 0, 0, 0, 0, 0, 1])
}

/// The all-routers link-local multicast group, destination of Router
/// Solicitations.
pub(crate) fn all_routers_multicast() -> Ipv6Addr {
    Ipv6Addr::new([0xff02, 0, 0, 0, 0, 0, 0, 2])
}
