// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The discovered prefix table.
//!
//! This module maintains the on-link and route prefixes discovered from
//! Router Advertisements received on the infrastructure link, by processing
//! the PIO and RIO options of each message. The decision whether a given
//! option should be processed at all is delegated back to the caller
//! through [`RaOptionFilter`].
//!
//! The table manages entry lifetimes with a single expiry timer and keeps
//! the Thread Network Data in sync: for every distinct route prefix it
//! publishes the favored entry (highest preference, then numerically lowest
//! advertising router) as an external route. On-link prefixes are never
//! published; the table only reports the favored one to the routing policy.
//!
//! Any batch of changes raises a single deferred change signal, delivered
//! through the zero-delay [`TimerId::DiscoveredPrefixTableChanged`] timer
//! after the mutating entry point returns.

use core::time::Duration;

use log::warn;
use net_types::ip::Ipv6Addr;

use crate::context::{InstantBindingsTypes, TimerContext};
use crate::counters::BorderRoutingCounters;
use crate::ndp::{NdpOption, PrefixInfo, RouteInfo, RoutePreference, RouterAdvertMessage};
use crate::net_data::{ExternalRouteConfig, NetworkDataContext, PublishError};
use crate::prefix::Prefix;
use crate::time::{Instant, TimerId};

/// The maximum number of discovered routers.
pub(crate) const MAX_ROUTERS: usize = 16;

/// The maximum number of discovered prefix entries, shared by all routers.
pub(crate) const MAX_ENTRIES: usize = 64;

/// The time, in seconds, after which an unrefreshed discovered prefix or
/// learned RA header is considered possibly withdrawn and re-solicited.
pub(crate) const STALE_RA_TIME_SECS: u32 = 1800;

const TWO_HOURS_SECS: u32 = 2 * 3600;

/// The execution context the table needs from the bindings.
pub(crate) trait TableBindingsContext: TimerContext<TimerId> + NetworkDataContext {}
impl<BC: TimerContext<TimerId> + NetworkDataContext> TableBindingsContext for BC {}

/// The per-option admission decisions, delegated to the routing manager.
pub(crate) trait RaOptionFilter {
    /// Whether the given PIO should be merged into the table.
    fn should_process_prefix_info(&self, pio: &PrefixInfo) -> bool;
    /// Whether an RIO for the given (masked) prefix should be merged.
    fn should_process_route_info(&self, prefix: &Prefix) -> bool;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum DiscoveredPrefixKind {
    OnLink { preferred_lifetime: u32 },
    Route { preference: RoutePreference },
}

/// One discovered PIO or RIO from a neighboring router.
#[derive(Clone, Debug)]
pub(crate) struct DiscoveredPrefix<I> {
    prefix: Prefix,
    kind: DiscoveredPrefixKind,
    valid_lifetime: u32,
    last_update: I,
}

impl<I: Instant> DiscoveredPrefix<I> {
    pub(crate) fn is_on_link(&self) -> bool {
        matches!(self.kind, DiscoveredPrefixKind::OnLink { .. })
    }

    // An on-link prefix with a zero preferred lifetime is still valid but
    // must not be favored for address configuration.
    pub(crate) fn is_deprecated(&self) -> bool {
        matches!(self.kind, DiscoveredPrefixKind::OnLink { preferred_lifetime: 0 })
    }

    pub(crate) fn valid_lifetime(&self) -> u32 {
        self.valid_lifetime
    }

    fn route_preference(&self) -> RoutePreference {
        match self.kind {
            DiscoveredPrefixKind::Route { preference } => preference,
            DiscoveredPrefixKind::OnLink { .. } => {
                unreachable!("route preference of an on-link entry")
            }
        }
    }

    fn expire_time(&self) -> I {
        self.last_update.add(Duration::from_secs(self.valid_lifetime.into()))
    }

    fn stale_time(&self) -> I {
        let lifetime = match self.kind {
            DiscoveredPrefixKind::OnLink { preferred_lifetime } => preferred_lifetime,
            DiscoveredPrefixKind::Route { .. } => self.valid_lifetime,
        };
        self.last_update.add(Duration::from_secs(lifetime.min(STALE_RA_TIME_SECS).into()))
    }

    // RFC 4862 section 5.5.3(e): adopt the advertised valid lifetime only if
    // it exceeds two hours or extends the remaining lifetime; otherwise clip
    // the remaining lifetime to two hours unless it is already below that.
    fn adopt_lifetimes_from_pio(&mut self, valid_lifetime: u32, preferred_lifetime: u32, now: I) {
        let advertised_expire = now.add(Duration::from_secs(valid_lifetime.into()));
        if valid_lifetime > TWO_HOURS_SECS || advertised_expire > self.expire_time() {
            self.valid_lifetime = valid_lifetime;
        } else if self.expire_time() > now.add(Duration::from_secs(TWO_HOURS_SECS.into())) {
            self.valid_lifetime = TWO_HOURS_SECS;
        }
        self.kind = DiscoveredPrefixKind::OnLink { preferred_lifetime };
        self.last_update = now;
    }
}

type EntryIndex = u16;

// The entry store is an arena of fixed slots. Used slots form per-router
// singly linked lists; free slots form the free list. All links are slot
// indices, so the table performs no allocation after construction.
#[derive(Debug)]
enum Slot<I> {
    Free { next_free: Option<EntryIndex> },
    Used { entry: DiscoveredPrefix<I>, next: Option<EntryIndex> },
}

#[derive(Debug)]
struct EntryArena<I> {
    slots: Vec<Slot<I>>,
    free_head: Option<EntryIndex>,
}

impl<I: Instant> EntryArena<I> {
    fn new() -> EntryArena<I> {
        EntryArena {
            slots: (0..MAX_ENTRIES)
                .map(|i| {
                    let next = i + 1;
                    Slot::Free {
                        next_free: (next < MAX_ENTRIES).then_some(next as EntryIndex),
                    }
                })
                .collect(),
            free_head: Some(0),
        }
    }

    fn allocate(
        &mut self,
        entry: DiscoveredPrefix<I>,
        next: Option<EntryIndex>,
    ) -> Option<EntryIndex> {
        let index = self.free_head?;
        let slot = &mut self.slots[usize::from(index)];
        self.free_head = match slot {
            Slot::Free { next_free } => *next_free,
            Slot::Used { .. } => unreachable!("free list points at a used slot"),
        };
        *slot = Slot::Used { entry, next };
        Some(index)
    }

    fn free(&mut self, index: EntryIndex) -> DiscoveredPrefix<I> {
        let slot = core::mem::replace(
            &mut self.slots[usize::from(index)],
            Slot::Free { next_free: self.free_head },
        );
        self.free_head = Some(index);
        match slot {
            Slot::Used { entry, next: _ } => entry,
            Slot::Free { .. } => unreachable!("freeing a free slot"),
        }
    }

    fn entry(&self, index: EntryIndex) -> &DiscoveredPrefix<I> {
        match &self.slots[usize::from(index)] {
            Slot::Used { entry, next: _ } => entry,
            Slot::Free { .. } => unreachable!("reading a free slot"),
        }
    }

    fn entry_mut(&mut self, index: EntryIndex) -> &mut DiscoveredPrefix<I> {
        match &mut self.slots[usize::from(index)] {
            Slot::Used { entry, next: _ } => entry,
            Slot::Free { .. } => unreachable!("reading a free slot"),
        }
    }

    fn next(&self, index: EntryIndex) -> Option<EntryIndex> {
        match &self.slots[usize::from(index)] {
            Slot::Used { entry: _, next } => *next,
            Slot::Free { .. } => unreachable!("reading a free slot"),
        }
    }

    fn set_next(&mut self, index: EntryIndex, new_next: Option<EntryIndex>) {
        match &mut self.slots[usize::from(index)] {
            Slot::Used { entry: _, next } => *next = new_next,
            Slot::Free { .. } => unreachable!("linking a free slot"),
        }
    }
}

/// A neighboring router, identified by the source address of its RAs.
#[derive(Debug)]
pub(crate) struct Router {
    address: Ipv6Addr,
    head: Option<EntryIndex>,
}

/// The discovered prefix table.
#[derive(Debug)]
pub(crate) struct DiscoveredPrefixTable<I> {
    routers: Vec<Router>,
    arena: EntryArena<I>,
    allow_default_route_in_net_data: bool,
}

impl<I: Instant> DiscoveredPrefixTable<I> {
    pub(crate) fn new() -> DiscoveredPrefixTable<I> {
        DiscoveredPrefixTable {
            routers: Vec::with_capacity(MAX_ROUTERS),
            arena: EntryArena::new(),
            allow_default_route_in_net_data: false,
        }
    }

    /// Merges a received Router Advertisement into the table.
    pub(crate) fn process_router_advert_message<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        ra: &RouterAdvertMessage<'_>,
        src: Ipv6Addr,
        filter: &dyn RaOptionFilter,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let router = match self.routers.iter().position(|router| router.address == src) {
            Some(router) => router,
            None => {
                if self.routers.len() == MAX_ROUTERS {
                    counters.discovered_routers_dropped.increment();
                    warn!("received RA from too many routers, ignoring RA from {}", src);
                    return;
                }
                self.routers.push(Router { address: src, head: None });
                self.routers.len() - 1
            }
        };

        let mut changed = false;

        // The RA header itself advertises (or withdraws) a default route. A
        // `::/0` RIO in the same message shares the entry and overrides the
        // header values (RFC 4191 section 3.1).
        let header = ra.header();
        let default_route = RouteInfo {
            prefix: Prefix::default_route(),
            preference: header.default_route_preference(),
            route_lifetime: u32::from(header.router_lifetime),
        };
        changed |= self.process_route_info(bctx, counters, router, &default_route);

        for option in ra.options() {
            match option {
                NdpOption::PrefixInfo(pio) => {
                    if !filter.should_process_prefix_info(&pio) {
                        continue;
                    }
                    changed |= self.process_prefix_info(bctx, counters, router, &pio);
                }
                NdpOption::RouteInfo(rio) => {
                    if !filter.should_process_route_info(&rio.prefix) {
                        continue;
                    }
                    changed |= self.process_route_info(bctx, counters, router, &rio);
                }
            }
        }

        self.remove_routers_with_no_entries();
        self.update_expiry_timer(bctx);
        if changed {
            self.signal_table_changed(bctx);
        }
    }

    fn process_route_info<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        router: usize,
        rio: &RouteInfo,
    ) -> bool
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let RouteInfo { prefix, preference, route_lifetime } = rio;
        let now = bctx.now();
        let existing = self.find_in_router(router, prefix, false);

        if *route_lifetime == 0 {
            return match existing {
                Some(index) => {
                    let _: DiscoveredPrefix<I> = self.unlink(router, index);
                    self.update_net_data_after_route_removal(bctx, counters, prefix);
                    true
                }
                None => false,
            };
        }

        let changed = match existing {
            Some(index) => {
                let entry = self.arena.entry_mut(index);
                let new_kind = DiscoveredPrefixKind::Route { preference: *preference };
                let changed = entry.valid_lifetime != *route_lifetime || entry.kind != new_kind;
                entry.valid_lifetime = *route_lifetime;
                entry.kind = new_kind;
                entry.last_update = now;
                changed
            }
            None => {
                let pushed = self.push_front(
                    router,
                    DiscoveredPrefix {
                        prefix: *prefix,
                        kind: DiscoveredPrefixKind::Route { preference: *preference },
                        valid_lifetime: *route_lifetime,
                        last_update: now,
                    },
                );
                if !pushed {
                    counters.discovered_prefixes_dropped.increment();
                    warn!("discovered prefix table is full, ignoring route prefix {}", prefix);
                    return false;
                }
                true
            }
        };

        if changed {
            self.publish_favored_route_entry(bctx, counters, prefix);
        }
        changed
    }

    fn process_prefix_info<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        router: usize,
        pio: &PrefixInfo,
    ) -> bool
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let PrefixInfo { prefix, on_link: _, autonomous: _, valid_lifetime, preferred_lifetime } =
            pio;
        let now = bctx.now();
        let existing = self.find_in_router(router, prefix, true);

        if *valid_lifetime == 0 {
            return match existing {
                Some(index) => {
                    let _: DiscoveredPrefix<I> = self.unlink(router, index);
                    true
                }
                None => false,
            };
        }

        match existing {
            Some(index) => {
                let entry = self.arena.entry_mut(index);
                let before = (entry.valid_lifetime, entry.kind.clone());
                entry.adopt_lifetimes_from_pio(*valid_lifetime, *preferred_lifetime, now);
                (entry.valid_lifetime, entry.kind.clone()) != before
            }
            None => {
                let pushed = self.push_front(
                    router,
                    DiscoveredPrefix {
                        prefix: *prefix,
                        kind: DiscoveredPrefixKind::OnLink {
                            preferred_lifetime: *preferred_lifetime,
                        },
                        valid_lifetime: *valid_lifetime,
                        last_update: now,
                    },
                );
                if !pushed {
                    counters.discovered_prefixes_dropped.increment();
                    warn!("discovered prefix table is full, ignoring on-link prefix {}", prefix);
                    return false;
                }
                true
            }
        }
    }

    /// Removes every entry, withdrawing published routes, and disarms the
    /// expiry timer.
    pub(crate) fn remove_all_entries<BC>(&mut self, bctx: &mut BC)
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let mut removed_any = false;
        for router in 0..self.routers.len() {
            while let Some(index) = self.routers[router].head {
                self.routers[router].head = self.arena.next(index);
                let entry = self.arena.free(index);
                if !entry.is_on_link() {
                    bctx.unpublish_external_route(&entry.prefix);
                }
                removed_any = true;
            }
        }
        self.routers.clear();
        let _: Option<I> = bctx.cancel_timer(TimerId::DiscoveredPrefixExpiry);
        if removed_any {
            self.signal_table_changed(bctx);
        }
    }

    /// Removes route entries for `prefix` from every router, withdrawing it
    /// from Network Data.
    pub(crate) fn remove_route_prefix<BC>(&mut self, bctx: &mut BC, prefix: &Prefix)
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let mut removed = false;
        for router in 0..self.routers.len() {
            if let Some(index) = self.find_in_router(router, prefix, false) {
                let _: DiscoveredPrefix<I> = self.unlink(router, index);
                removed = true;
            }
        }
        if removed {
            bctx.unpublish_external_route(prefix);
            self.remove_routers_with_no_entries();
            self.update_expiry_timer(bctx);
            self.signal_table_changed(bctx);
        }
    }

    /// Deprecates on-link entries and drops route entries that have not been
    /// refreshed since `threshold`, typically the start of a solicitation
    /// round.
    pub(crate) fn remove_or_deprecate_old_entries<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        threshold: I,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let mut changed = false;
        for router in 0..self.routers.len() {
            let mut cursor = self.routers[router].head;
            while let Some(index) = cursor {
                cursor = self.arena.next(index);
                let entry = self.arena.entry_mut(index);
                if entry.last_update > threshold {
                    continue;
                }
                match &mut entry.kind {
                    DiscoveredPrefixKind::OnLink { preferred_lifetime } => {
                        if *preferred_lifetime != 0 {
                            *preferred_lifetime = 0;
                            changed = true;
                        }
                    }
                    DiscoveredPrefixKind::Route { .. } => {
                        if entry.valid_lifetime != 0 {
                            entry.valid_lifetime = 0;
                            changed = true;
                        }
                    }
                }
            }
        }
        changed |= self.remove_expired_entries(bctx, counters);
        if changed {
            self.signal_table_changed(bctx);
        }
    }

    /// Handles the table-wide expiry timer.
    pub(crate) fn handle_expiry_timer<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        if self.remove_expired_entries(bctx, counters) {
            self.signal_table_changed(bctx);
        }
    }

    /// Allows or disallows publishing the discovered `::/0` route into
    /// Network Data; the entry is tracked either way.
    pub(crate) fn set_allow_default_route_in_net_data<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        allow: bool,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        if allow == self.allow_default_route_in_net_data {
            return;
        }
        self.allow_default_route_in_net_data = allow;

        let default_route = Prefix::default_route();
        if !self.contains_route_prefix(&default_route) {
            return;
        }
        if allow {
            self.publish_favored_route_entry(bctx, counters, &default_route);
        } else {
            bctx.unpublish_external_route(&default_route);
        }
    }

    /// The numerically smallest non-deprecated discovered on-link prefix.
    pub(crate) fn find_favored_on_link_prefix(&self) -> Option<Prefix> {
        self.iter_entries()
            .filter(|(_, entry)| entry.is_on_link() && !entry.is_deprecated())
            .map(|(_, entry)| entry.prefix)
            .min()
    }

    /// The earliest instant at which re-solicitation is warranted: route
    /// entries go stale individually, while on-link prefixes only warrant it
    /// once the last fresh one goes stale.
    pub(crate) fn calculate_next_stale_time(&self, now: I) -> Option<I> {
        let mut on_link_stale: Option<I> = None;
        let mut route_stale: Option<I> = None;
        for (_, entry) in self.iter_entries() {
            let stale = now.max(entry.stale_time());
            if entry.is_on_link() {
                if !entry.is_deprecated() {
                    on_link_stale = Some(on_link_stale.map_or(stale, |t| t.max(stale)));
                }
            } else {
                route_stale = Some(route_stale.map_or(stale, |t| t.min(stale)));
            }
        }
        match (on_link_stale, route_stale) {
            (Some(on_link), Some(route)) => Some(on_link.min(route)),
            (on_link, route) => on_link.or(route),
        }
    }

    pub(crate) fn contains_route_prefix(&self, prefix: &Prefix) -> bool {
        self.iter_entries()
            .any(|(_, entry)| !entry.is_on_link() && entry.prefix == *prefix)
    }

    pub(crate) fn iter_entries(
        &self,
    ) -> impl Iterator<Item = (&Router, &DiscoveredPrefix<I>)> + '_ {
        EntryIter {
            table: self,
            router: 0,
            cursor: self.routers.first().and_then(|router| router.head),
        }
    }

    fn remove_expired_entries<BC>(
        &mut self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
    ) -> bool
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let now = bctx.now();
        let mut removed_any = false;
        for router in 0..self.routers.len() {
            loop {
                let expired = {
                    let mut cursor = self.routers[router].head;
                    let mut found = None;
                    while let Some(index) = cursor {
                        let entry = self.arena.entry(index);
                        if entry.expire_time() <= now {
                            found = Some(index);
                            break;
                        }
                        cursor = self.arena.next(index);
                    }
                    found
                };
                let Some(index) = expired else {
                    break;
                };
                let entry = self.unlink(router, index);
                if !entry.is_on_link() {
                    self.update_net_data_after_route_removal(bctx, counters, &entry.prefix);
                }
                removed_any = true;
            }
        }
        if removed_any {
            self.remove_routers_with_no_entries();
        }
        self.update_expiry_timer(bctx);
        removed_any
    }

    // Publishes the favored entry for a route prefix, i.e. the one every
    // Border Router processing the same RAs would pick: highest preference,
    // then numerically lowest router address.
    fn publish_favored_route_entry<BC>(
        &self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        prefix: &Prefix,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        if prefix.length() == 0 && !self.allow_default_route_in_net_data {
            return;
        }

        let mut favored: Option<(RoutePreference, [u8; 16])> = None;
        for (router, entry) in self.iter_entries() {
            if entry.is_on_link() || entry.prefix != *prefix {
                continue;
            }
            let preference = entry.route_preference();
            let address = router.address.ipv6_bytes();
            let is_favored = favored.as_ref().map_or(true, |(fav_preference, fav_address)| {
                preference > *fav_preference
                    || (preference == *fav_preference && address < *fav_address)
            });
            if is_favored {
                favored = Some((preference, address));
            }
        }

        if let Some((preference, _)) = favored {
            bctx.publish_external_route(ExternalRouteConfig {
                prefix: *prefix,
                preference,
                nat64: false,
            })
            .unwrap_or_else(|PublishError| {
                counters.net_data_publish_failed.increment();
                warn!("failed to publish discovered route {} to Network Data", prefix);
            });
        }
    }

    fn update_net_data_after_route_removal<BC>(
        &self,
        bctx: &mut BC,
        counters: &BorderRoutingCounters,
        prefix: &Prefix,
    ) where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        if self.contains_route_prefix(prefix) {
            // Another router still advertises the prefix; hand the
            // publication over to the new favored entry.
            self.publish_favored_route_entry(bctx, counters, prefix);
        } else {
            bctx.unpublish_external_route(prefix);
        }
    }

    fn find_in_router(&self, router: usize, prefix: &Prefix, on_link: bool) -> Option<EntryIndex> {
        let mut cursor = self.routers[router].head;
        while let Some(index) = cursor {
            let entry = self.arena.entry(index);
            if entry.prefix == *prefix && entry.is_on_link() == on_link {
                return Some(index);
            }
            cursor = self.arena.next(index);
        }
        None
    }

    fn push_front(&mut self, router: usize, entry: DiscoveredPrefix<I>) -> bool {
        let head = self.routers[router].head;
        match self.arena.allocate(entry, head) {
            Some(index) => {
                self.routers[router].head = Some(index);
                true
            }
            None => false,
        }
    }

    fn unlink(&mut self, router: usize, index: EntryIndex) -> DiscoveredPrefix<I> {
        let head = self.routers[router].head;
        if head == Some(index) {
            self.routers[router].head = self.arena.next(index);
        } else {
            let mut cursor = head;
            let mut prev = None;
            while let Some(current) = cursor {
                if current == index {
                    break;
                }
                prev = Some(current);
                cursor = self.arena.next(current);
            }
            let prev = prev.expect("unlinked entry not on the router's list");
            self.arena.set_next(prev, self.arena.next(index));
        }
        self.arena.free(index)
    }

    fn remove_routers_with_no_entries(&mut self) {
        self.routers.retain(|router| router.head.is_some());
    }

    fn update_expiry_timer<BC>(&self, bctx: &mut BC)
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        let next = self.iter_entries().map(|(_, entry)| entry.expire_time()).min();
        match next {
            Some(time) => {
                let _: Option<I> = bctx.schedule_timer_instant(time, TimerId::DiscoveredPrefixExpiry);
            }
            None => {
                let _: Option<I> = bctx.cancel_timer(TimerId::DiscoveredPrefixExpiry);
            }
        }
    }

    // Multiple mutations within one entry point coalesce into a single
    // deferred signal, delivered on the next timer dispatch.
    fn signal_table_changed<BC>(&self, bctx: &mut BC)
    where
        BC: TableBindingsContext + InstantBindingsTypes<Instant = I>,
    {
        if bctx.scheduled_instant(TimerId::DiscoveredPrefixTableChanged).is_none() {
            let _: Option<I> =
                bctx.schedule_timer(Duration::ZERO, TimerId::DiscoveredPrefixTableChanged);
        }
    }
}

struct EntryIter<'a, I> {
    table: &'a DiscoveredPrefixTable<I>,
    router: usize,
    cursor: Option<EntryIndex>,
}

impl<'a, I: Instant> Iterator for EntryIter<'a, I> {
    type Item = (&'a Router, &'a DiscoveredPrefix<I>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.cursor {
                Some(index) => {
                    self.cursor = self.table.arena.next(index);
                    return Some((&self.table.routers[self.router], self.table.arena.entry(index)));
                }
                None => {
                    self.router += 1;
                    if self.router >= self.table.routers.len() {
                        return None;
                    }
                    self.cursor = self.table.routers[self.router].head;
                }
            }
        }
    }
}
