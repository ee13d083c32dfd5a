// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Types and utilities for working with event counters.

use core::sync::atomic::{AtomicU64, Ordering};

/// An atomic counter for observable events, e.g. Router Advertisements
/// received.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn increment(&self) {
        // Use relaxed ordering since we do not use counter values to
        // synchronize other accesses. See:
        // https://doc.rust-lang.org/nomicon/atomics.html#relaxed
        let Self(v) = self;
        let _: u64 = v.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically retrieves the counter value as a `u64`.
    pub fn get(&self) -> u64 {
        // Use relaxed ordering since we do not use counter values to
        // synchronize other accesses. See:
        // https://doc.rust-lang.org/nomicon/atomics.html#relaxed
        let Self(v) = self;
        v.load(Ordering::Relaxed)
    }
}

/// Border routing counters.
///
/// Every silent-drop path in the core increments one of these, so dropped
/// messages, exhausted tables and failed publications remain observable even
/// though they are not surfaced as errors.
#[derive(Debug, Default)]
pub struct BorderRoutingCounters {
    /// Count of received Router Advertisement messages.
    pub rx_router_advertisement: Counter,
    /// Count of received Router Solicitation messages.
    pub rx_router_solicitation: Counter,
    /// Count of received messages dropped because they were malformed or
    /// failed validity checks.
    pub rx_dropped: Counter,
    /// Count of transmitted Router Advertisement messages.
    pub tx_router_advertisement: Counter,
    /// Count of transmitted Router Solicitation messages.
    pub tx_router_solicitation: Counter,
    /// Count of failed transmissions on the infrastructure interface.
    pub tx_failed: Counter,
    /// Count of Router Advertisements dropped because the discovered router
    /// set was full.
    pub discovered_routers_dropped: Counter,
    /// Count of PIO/RIO options dropped because the discovered prefix entry
    /// pool was full.
    pub discovered_prefixes_dropped: Counter,
    /// Count of failed Thread Network Data publications.
    pub net_data_publish_failed: Counter,
}
