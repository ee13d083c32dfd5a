// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The core of a Thread Border Router's RA-based routing manager.
//!
//! This crate bridges a Thread (802.15.4 mesh) network to an adjacent IPv6
//! infrastructure link. It participates as a router on the infrastructure
//! link via IPv6 Neighbor Discovery (RFC 4861) and SLAAC-style prefix
//! advertisement (RFC 4862), and synchronizes the set of routable prefixes
//! between the two realms through the Thread Network Data:
//!
//! - It maintains a bounded table of prefixes discovered from neighboring
//!   routers' Router Advertisements, publishing discovered routes into the
//!   Thread Network Data as they come and go.
//! - It selects, deterministically across independently configured Border
//!   Routers, which OMR, on-link and NAT64 prefixes this device should
//!   publish or advertise, generating them from a persisted random ULA /48
//!   where the network provides none.
//! - It runs the Router Solicitation / Router Advertisement state machine
//!   with the standard jitter, pacing and retraction behaviors.
//!
//! The crate is sans-IO: sockets, Thread Network Data encoding, persistent
//! storage, clocks, timers and randomness are all provided by the embedder
//! through the context traits in [`context`], [`infra_if`], [`net_data`]
//! and [`settings`]. All handlers run to completion on a single logical
//! task; the core requires (and assumes) serialized dispatch.

#![deny(missing_docs, unreachable_patterns)]

pub mod context;
pub mod counters;
mod error;
pub mod infra_if;
pub mod ndp;
pub mod net_data;
pub mod prefix;
pub(crate) mod route_discovery;
pub mod routing_manager;
pub mod settings;
#[cfg(test)]
mod testutil;
pub mod time;

pub use counters::BorderRoutingCounters;
pub use error::Error;
pub use prefix::Prefix;
pub use routing_manager::{BorderRoutingBindingsContext, OmrPrefix, RoutingManager};
pub use time::{Instant, TimerId};
