// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The RA-based routing manager.
//!
//! The routing manager bridges a Thread mesh to an adjacent IPv6
//! infrastructure link: it participates as a router on the infrastructure
//! link via Neighbor Discovery ([RFC 4861]) and SLAAC-style prefix
//! advertisement ([RFC 4862]), and keeps the set of routable prefixes
//! synchronized between the two realms through the Thread Network Data.
//!
//! All ICMPv6 messages are sent and received on the infrastructure
//! interface. The manager owns the Router Solicitation / Router
//! Advertisement state machine, the routing policy evaluation that selects
//! the OMR, on-link and NAT64 prefixes to publish or advertise, and the
//! [discovered prefix table] fed by received Router Advertisements.
//!
//! [RFC 4861]: https://datatracker.ietf.org/doc/html/rfc4861
//! [RFC 4862]: https://datatracker.ietf.org/doc/html/rfc4862
//! [discovered prefix table]: crate::route_discovery

use core::time::Duration;

use log::{debug, info, warn};
use net_types::ip::Ipv6Addr;
use net_types::{LinkLocalUnicastAddr, Witness as _};
use rand::Rng as _;

use crate::context::{InstantBindingsTypes, InstantContext, RngContext, TimerContext};
use crate::counters::BorderRoutingCounters;
use crate::error::Error;
use crate::infra_if::{all_nodes_multicast, all_routers_multicast, InfraIfContext, SendError};
use crate::ndp::{
    self, PrefixInfo, RouteInfo, RoutePreference, RouterAdvertBuilder, RouterAdvertHeader,
    RouterAdvertMessage,
};
use crate::net_data::{
    ExternalRouteConfig, NetworkDataContext, OnMeshPrefixConfig, PublishError,
};
use crate::prefix::{self, Prefix};
use crate::route_discovery::{
    DiscoveredPrefixTable, RaOptionFilter, STALE_RA_TIME_SECS,
};
use crate::settings::SettingsContext;
use crate::time::{Instant, TimerId};

/// The maximum number of OMR prefixes to advertise, matching the SLAAC
/// address cap of a typical Thread device.
const MAX_OMR_PREFIXES: usize = 3;

/// The maximum number of Router Solicitations sent per round before
/// concluding that the link has been probed (RFC 4861 section 10).
const MAX_RTR_SOLICITATIONS: u8 = 3;

/// As per [RFC 4861 section 6.3.7], before a node sends an initial Router
/// Solicitation it SHOULD delay the transmission for a random amount of time
/// between 0 and `MAX_RTR_SOLICITATION_DELAY`, to alleviate congestion when
/// many hosts start up on a link at the same time.
///
/// [RFC 4861 section 6.3.7]: https://tools.ietf.org/html/rfc4861#section-6.3.7
const MAX_RTR_SOLICITATION_DELAY: Duration = Duration::from_secs(1);

/// Duration between Router Solicitation messages within a round, as defined
/// in [RFC 4861 section 10].
///
/// [RFC 4861 section 10]: https://tools.ietf.org/html/rfc4861#section-10
const RTR_SOLICITATION_INTERVAL: Duration = Duration::from_secs(4);

/// The delay before retrying a Router Solicitation whose transmission
/// failed. The failed attempt does not count against the round.
const RTR_SOLICITATION_RETRY_DELAY: Duration = RTR_SOLICITATION_INTERVAL;

/// The number of initial Router Advertisements sent on the accelerated
/// schedule (RFC 4861 section 6.2.4).
const MAX_INIT_RTR_ADVERTISEMENTS: u32 = 3;

/// The interval cap applied while the initial Router Advertisements are
/// outstanding.
const MAX_INIT_RTR_ADV_INTERVAL: Duration = Duration::from_secs(16);

/// The bounds of the uniformly drawn interval between unsolicited Router
/// Advertisements.
const MIN_RTR_ADV_INTERVAL: Duration = Duration::from_secs(200);
const MAX_RTR_ADV_INTERVAL: Duration = Duration::from_secs(600);

/// The minimum spacing between any two of our Router Advertisements
/// (MIN_DELAY_BETWEEN_RAS, RFC 4861 section 6.2.6).
const MIN_DELAY_BETWEEN_RTR_ADVS: Duration = Duration::from_millis(3000);

/// The jitter bound for a Router Advertisement sent in response to a Router
/// Solicitation (RFC 4861 section 6.2.6).
const RA_REPLY_JITTER: Duration = Duration::from_millis(500);

/// The jitter bound for a routing policy evaluation triggered by a state
/// change; coalesces bursts of triggers into one evaluation.
const ROUTING_POLICY_EVALUATION_JITTER: Duration = Duration::from_millis(1000);

/// The advertised lifetime of the local on-link prefix, in seconds. Also the
/// duration of its deprecation after withdrawal.
const DEFAULT_ON_LINK_PREFIX_LIFETIME: u32 = 1800;

/// The advertised route lifetime of OMR prefixes, in seconds.
const DEFAULT_OMR_PREFIX_LIFETIME: u32 = 1800;

/// The advertised route lifetime of the NAT64 prefix, in seconds.
const DEFAULT_NAT64_PREFIX_LIFETIME: u32 = 1800;

/// The preference the local OMR prefix is published with.
const LOCAL_OMR_PREFIX_PREFERENCE: RoutePreference = RoutePreference::Low;

// Subnet IDs carved out of the BR ULA /48.
const OMR_PREFIX_SUBNET_ID: u16 = 1;
const NAT64_PREFIX_SUBNET_ID: u16 = 2;

const _: () = assert!(MIN_RTR_ADV_INTERVAL.as_secs() <= 3 * MAX_RTR_ADV_INTERVAL.as_secs() / 4);
const _: () = assert!(DEFAULT_ON_LINK_PREFIX_LIFETIME as u64 >= MAX_RTR_ADV_INTERVAL.as_secs());

/// The execution context the routing manager requires from its bindings.
pub trait BorderRoutingBindingsContext:
    RngContext
    + TimerContext<TimerId>
    + InfraIfContext
    + NetworkDataContext
    + SettingsContext
{
}
impl<
        BC: RngContext
            + TimerContext<TimerId>
            + InfraIfContext
            + NetworkDataContext
            + SettingsContext,
    > BorderRoutingBindingsContext for BC
{
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Stopped,
    Soliciting,
    Advertising,
}

/// An OMR prefix together with the preference it is advertised with.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OmrPrefix {
    prefix: Prefix,
    preference: RoutePreference,
}

impl OmrPrefix {
    /// The prefix.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The advertised preference.
    pub fn preference(&self) -> RoutePreference {
        self.preference
    }

    // Higher preference wins; ties break to the numerically smaller prefix,
    // so independently configured Border Routers converge on the same
    // favored prefix.
    fn is_favored_over(&self, other: &OmrPrefix) -> bool {
        self.preference > other.preference
            || (self.preference == other.preference && self.prefix < other.prefix)
    }
}

fn is_valid_omr_prefix_config(config: &OnMeshPrefixConfig) -> bool {
    let OnMeshPrefixConfig {
        prefix,
        preference: _,
        on_mesh,
        slaac,
        preferred,
        stable,
        default_route: _,
    } = config;
    prefix.is_valid_omr() && *on_mesh && *stable && (*slaac || *preferred)
}

fn is_valid_on_link_prefix_info(pio: &PrefixInfo) -> bool {
    let PrefixInfo { prefix, on_link, autonomous, valid_lifetime, preferred_lifetime } = pio;
    prefix.is_valid_on_link()
        && *on_link
        && *autonomous
        // RFC 4862 section 5.5.3(c).
        && preferred_lifetime <= valid_lifetime
}

// The option admission policy handed to the discovered prefix table while
// processing a received RA.
struct DiscoveredPrefixFilter<'a> {
    is_running: bool,
    local_on_link_prefix: &'a Prefix,
    is_advertising_local_on_link_prefix: bool,
    local_omr_prefix: &'a Prefix,
    advertised_omr_prefixes: &'a [OmrPrefix],
    net_data_omr_prefixes: &'a [Prefix],
}

impl RaOptionFilter for DiscoveredPrefixFilter<'_> {
    fn should_process_prefix_info(&self, pio: &PrefixInfo) -> bool {
        if !self.is_running {
            return false;
        }
        if !is_valid_on_link_prefix_info(pio) {
            debug!("ignoring PIO with invalid on-link prefix {}", pio.prefix);
            return false;
        }
        // Our own advertised prefix echoed back is not a discovery.
        !(self.is_advertising_local_on_link_prefix && pio.prefix == *self.local_on_link_prefix)
    }

    fn should_process_route_info(&self, prefix: &Prefix) -> bool {
        if !self.is_running {
            return false;
        }
        if prefix.length() == 0 {
            // The default route is always tracked; whether it may enter the
            // Network Data is gated separately.
            return true;
        }
        if !prefix.is_valid_omr() {
            debug!("ignoring RIO prefix {}: not a valid OMR prefix", prefix);
            return false;
        }
        // Prefixes reachable inside the Thread mesh must not be routed
        // through the infrastructure link. The advertised set and the
        // Network Data are checked separately since they can be briefly out
        // of sync around policy evaluations.
        *prefix != *self.local_omr_prefix
            && !self.advertised_omr_prefixes.iter().any(|omr| omr.prefix == *prefix)
            && !self.net_data_omr_prefixes.contains(prefix)
    }
}

/// The RA-based routing manager, one per Thread instance.
///
/// The embedder owns the manager and drives it with received packets
/// ([`handle_received`]), timer fires ([`handle_timer`]) and notifier events;
/// all platform access goes through the [`BorderRoutingBindingsContext`]
/// passed into each call. Handlers run to completion; the manager assumes
/// serialized, single-threaded dispatch.
///
/// [`handle_received`]: RoutingManager::handle_received
/// [`handle_timer`]: RoutingManager::handle_timer
pub struct RoutingManager<BC: InstantBindingsTypes> {
    state: State,
    is_enabled: bool,
    infra_if_index: Option<u32>,
    infra_if_running: bool,
    thread_attached: bool,

    // The /48 BR ULA prefix loaded from persistent storage, or randomly
    // generated if none was found. OMR and NAT64 prefixes are carved out of
    // it at fixed subnet IDs.
    br_ula_prefix: Prefix,
    local_omr_prefix: Prefix,
    local_nat64_prefix: Prefix,
    local_on_link_prefix: Prefix,

    advertised_omr_prefixes: Vec<OmrPrefix>,
    is_local_omr_published: bool,

    favored_discovered_on_link_prefix: Option<Prefix>,
    is_advertising_local_on_link_prefix: bool,
    // The last time the on-link prefix was advertised with a non-zero
    // preferred lifetime; deprecation runs relative to it.
    time_advertised_on_link_prefix: Option<BC::Instant>,

    is_advertising_local_nat64_prefix: bool,

    discovered_prefix_table: DiscoveredPrefixTable<BC::Instant>,

    // The RA header to emit: default, or learned from another advertising
    // daemon on this host.
    router_advert_header: RouterAdvertHeader,
    learnt_router_advert_from_host: bool,
    time_router_advert_last_update: Option<BC::Instant>,

    router_advertisement_count: u32,
    last_router_advertisement_send_time: Option<BC::Instant>,

    time_router_solicit_start: Option<BC::Instant>,
    router_solicit_count: u8,

    counters: BorderRoutingCounters,
}

impl<BC: BorderRoutingBindingsContext> RoutingManager<BC> {
    /// Creates a new, uninitialized routing manager.
    pub fn new() -> RoutingManager<BC> {
        RoutingManager {
            state: State::Stopped,
            is_enabled: false,
            infra_if_index: None,
            infra_if_running: false,
            thread_attached: false,
            br_ula_prefix: Prefix::default_route(),
            local_omr_prefix: Prefix::default_route(),
            local_nat64_prefix: Prefix::default_route(),
            local_on_link_prefix: Prefix::default_route(),
            advertised_omr_prefixes: Vec::new(),
            is_local_omr_published: false,
            favored_discovered_on_link_prefix: None,
            is_advertising_local_on_link_prefix: false,
            time_advertised_on_link_prefix: None,
            is_advertising_local_nat64_prefix: false,
            discovered_prefix_table: DiscoveredPrefixTable::new(),
            router_advert_header: RouterAdvertHeader::default(),
            learnt_router_advert_from_host: false,
            time_router_advert_last_update: None,
            router_advertisement_count: 0,
            last_router_advertisement_send_time: None,
            time_router_solicit_start: None,
            router_solicit_count: 0,
            counters: BorderRoutingCounters::default(),
        }
    }

    /// Initializes the manager on the given infrastructure interface,
    /// loading or generating the local prefixes.
    ///
    /// Returns [`Error::InvalidArgs`] for an interface index of zero and
    /// [`Error::InvalidState`] if already initialized.
    pub fn init(
        &mut self,
        bctx: &mut BC,
        infra_if_index: u32,
        infra_if_running: bool,
    ) -> Result<(), Error> {
        if self.infra_if_index.is_some() {
            return Err(Error::InvalidState);
        }
        if infra_if_index == 0 {
            return Err(Error::InvalidArgs);
        }
        self.infra_if_index = Some(infra_if_index);
        self.infra_if_running = infra_if_running;

        self.br_ula_prefix = match bctx.load_br_ula_prefix().filter(Prefix::is_valid_br_ula) {
            Some(loaded) => {
                info!("loaded BR ULA prefix {}", loaded);
                loaded
            }
            None => {
                let generated = {
                    let mut rng = bctx.rng();
                    prefix::generate_random_br_ula_prefix(&mut rng)
                };
                bctx.save_br_ula_prefix(&generated);
                info!("generated BR ULA prefix {}", generated);
                generated
            }
        };
        self.local_omr_prefix =
            self.br_ula_prefix.with_subnet_id(OMR_PREFIX_SUBNET_ID, prefix::OMR_PREFIX_LENGTH);
        self.local_nat64_prefix =
            self.br_ula_prefix.with_subnet_id(NAT64_PREFIX_SUBNET_ID, prefix::NAT64_PREFIX_LENGTH);

        self.local_on_link_prefix = match bctx
            .load_on_link_prefix()
            .filter(|loaded| loaded.is_valid_on_link() && loaded.is_unique_local())
        {
            Some(loaded) => {
                info!("loaded on-link prefix {}", loaded);
                loaded
            }
            None => {
                let generated = {
                    let mut rng = bctx.rng();
                    prefix::generate_random_on_link_prefix(&mut rng)
                };
                bctx.save_on_link_prefix(&generated);
                info!("generated on-link prefix {}", generated);
                generated
            }
        };

        self.evaluate_state(bctx);
        Ok(())
    }

    /// Enables or disables the manager. A no-op if the value is unchanged.
    ///
    /// Disabling sends a final retracting Router Advertisement, withdraws
    /// everything published and forgets the RA header learned from the
    /// host (which a Thread detach alone preserves).
    pub fn set_enabled(&mut self, bctx: &mut BC, enabled: bool) -> Result<(), Error> {
        if !self.is_initialized() {
            return Err(Error::InvalidState);
        }
        if enabled == self.is_enabled {
            return Ok(());
        }
        self.is_enabled = enabled;
        self.evaluate_state(bctx);
        if !enabled {
            self.router_advert_header = RouterAdvertHeader::default();
            self.learnt_router_advert_from_host = false;
            self.time_router_advert_last_update = None;
        }
        Ok(())
    }

    /// The local OMR prefix (BR ULA subnet 1, /64).
    pub fn omr_prefix(&self) -> Result<Prefix, Error> {
        self.is_initialized().then_some(self.local_omr_prefix).ok_or(Error::InvalidState)
    }

    /// The local on-link prefix for the infrastructure link.
    pub fn on_link_prefix(&self) -> Result<Prefix, Error> {
        self.is_initialized().then_some(self.local_on_link_prefix).ok_or(Error::InvalidState)
    }

    /// The local NAT64 prefix (BR ULA subnet 2, /96).
    pub fn nat64_prefix(&self) -> Result<Prefix, Error> {
        self.is_initialized().then_some(self.local_nat64_prefix).ok_or(Error::InvalidState)
    }

    /// The OMR prefixes currently advertised on the infrastructure link.
    pub fn advertised_omr_prefixes(&self) -> &[OmrPrefix] {
        &self.advertised_omr_prefixes
    }

    /// The observable event counters.
    pub fn counters(&self) -> &BorderRoutingCounters {
        &self.counters
    }

    /// Processes an ICMPv6 message received on the infrastructure
    /// interface. Malformed or undesired messages are dropped silently (and
    /// counted).
    pub fn handle_received(&mut self, bctx: &mut BC, packet: &[u8], src: Ipv6Addr) {
        if self.state == State::Stopped {
            return;
        }
        match packet.first() {
            Some(&ndp::ICMP6_TYPE_ROUTER_SOLICIT) => self.handle_router_solicit(bctx, packet, src),
            Some(&ndp::ICMP6_TYPE_ROUTER_ADVERT) => {
                self.handle_router_advertisement(bctx, packet, src)
            }
            // Other ICMPv6 types are not for us.
            Some(_) | None => {}
        }
    }

    /// Handles a fired timer.
    pub fn handle_timer(&mut self, bctx: &mut BC, id: TimerId) {
        match id {
            TimerId::RouterSolicit => self.handle_router_solicit_timer(bctx),
            TimerId::RoutingPolicy => self.evaluate_routing_policy(bctx),
            TimerId::OnLinkPrefixDeprecate => self.handle_on_link_prefix_deprecate_timer(),
            TimerId::DiscoveredPrefixExpiry => {
                let Self { discovered_prefix_table, counters, .. } = self;
                discovered_prefix_table.handle_expiry_timer(bctx, counters);
            }
            TimerId::DiscoveredPrefixStale => self.handle_discovered_prefix_stale_timer(bctx),
            TimerId::DiscoveredPrefixTableChanged => {
                self.handle_discovered_prefix_table_changed(bctx)
            }
        }
    }

    /// Handles a Thread role change from the notifier.
    pub fn handle_thread_role_changed(&mut self, bctx: &mut BC, attached: bool) {
        self.thread_attached = attached;
        if self.is_initialized() {
            self.evaluate_state(bctx);
        }
    }

    /// Handles a Thread Network Data change from the notifier.
    pub fn handle_network_data_changed(&mut self, bctx: &mut BC) {
        if self.state == State::Stopped {
            return;
        }
        self.update_discovered_prefix_table_on_net_data_change(bctx);
        self.start_routing_policy_evaluation_jitter(bctx, ROUTING_POLICY_EVALUATION_JITTER);
    }

    /// Handles an infrastructure interface state change from the notifier.
    pub fn handle_infra_if_state_changed(&mut self, bctx: &mut BC, running: bool) {
        self.infra_if_running = running;
        if self.is_initialized() {
            self.evaluate_state(bctx);
        }
    }

    fn is_initialized(&self) -> bool {
        self.infra_if_index.is_some()
    }

    fn evaluate_state(&mut self, bctx: &mut BC) {
        let should_run = self.is_enabled && self.thread_attached && self.infra_if_running;
        if should_run && self.state == State::Stopped {
            self.start(bctx);
        } else if !should_run && self.state != State::Stopped {
            self.stop(bctx);
        }
    }

    fn start(&mut self, bctx: &mut BC) {
        info!("border routing manager started");
        self.state = State::Soliciting;
        // Anything left over from a previous run is withdrawn before
        // soliciting afresh.
        self.discovered_prefix_table.remove_all_entries(bctx);
        self.start_router_solicitation_delay(bctx);
    }

    fn stop(&mut self, bctx: &mut BC) {
        // Retract everything downstream hosts may have learned from us
        // before any state is torn down.
        self.send_final_router_advertisement(bctx);

        if self.is_local_omr_published {
            self.unpublish_local_omr_prefix(bctx);
        }
        if self.is_advertising_local_nat64_prefix {
            bctx.unpublish_external_route(&self.local_nat64_prefix);
            self.is_advertising_local_nat64_prefix = false;
        }

        self.advertised_omr_prefixes.clear();
        self.is_advertising_local_on_link_prefix = false;
        self.favored_discovered_on_link_prefix = None;
        self.router_advertisement_count = 0;
        self.router_solicit_count = 0;
        self.time_router_solicit_start = None;

        // All owned timers are cancelled. The discovered prefix table keeps
        // its entries; they are drained on the next start.
        for id in [
            TimerId::RouterSolicit,
            TimerId::RoutingPolicy,
            TimerId::OnLinkPrefixDeprecate,
            TimerId::DiscoveredPrefixExpiry,
            TimerId::DiscoveredPrefixStale,
            TimerId::DiscoveredPrefixTableChanged,
        ] {
            let _: Option<BC::Instant> = bctx.cancel_timer(id);
        }

        self.state = State::Stopped;
        info!("border routing manager stopped");
    }

    fn handle_router_solicit(&mut self, bctx: &mut BC, packet: &[u8], src: Ipv6Addr) {
        self.counters.rx_router_solicitation.increment();
        if let Err(e) = ndp::parse_router_solicit(packet) {
            self.counters.rx_dropped.increment();
            debug!("dropping malformed RS from {}: {}", src, e);
            return;
        }
        info!("received RS from {}", src);
        // RFC 4861 section 6.2.6: respond with a jittered RA, still
        // honoring the minimum spacing between consecutive RAs.
        self.start_routing_policy_evaluation_jitter(bctx, RA_REPLY_JITTER);
    }

    fn handle_router_advertisement(&mut self, bctx: &mut BC, packet: &[u8], src: Ipv6Addr) {
        self.counters.rx_router_advertisement.increment();
        // RFC 4861 section 6.1.2: routers must use their link-local address
        // as the source so hosts can uniquely identify them.
        if LinkLocalUnicastAddr::new(src).is_none() {
            self.counters.rx_dropped.increment();
            debug!("dropping RA from non-link-local source {}", src);
            return;
        }
        let ra = match RouterAdvertMessage::parse(packet) {
            Ok(ra) => ra,
            Err(e) => {
                self.counters.rx_dropped.increment();
                debug!("dropping malformed RA from {}: {}", src, e);
                return;
            }
        };
        info!("received RA from {}", src);

        let net_data_omr_prefixes: Vec<Prefix> = bctx
            .on_mesh_prefixes()
            .iter()
            .filter(|config| is_valid_omr_prefix_config(config))
            .map(|config| config.prefix)
            .collect();
        {
            let Self {
                state,
                local_on_link_prefix,
                is_advertising_local_on_link_prefix,
                local_omr_prefix,
                advertised_omr_prefixes,
                discovered_prefix_table,
                counters,
                ..
            } = self;
            let filter = DiscoveredPrefixFilter {
                is_running: *state != State::Stopped,
                local_on_link_prefix,
                is_advertising_local_on_link_prefix: *is_advertising_local_on_link_prefix,
                local_omr_prefix,
                advertised_omr_prefixes,
                net_data_omr_prefixes: &net_data_omr_prefixes,
            };
            discovered_prefix_table.process_router_advert_message(bctx, counters, &ra, src, &filter);
        }

        // Remember the header and parameters of RA messages initiated on
        // this host, e.g. by another advertising daemon.
        if bctx.has_address(&src) {
            self.update_router_advert_header(bctx, Some(ra.header()));
        }
    }

    fn update_router_advert_header(&mut self, bctx: &mut BC, received: Option<&RouterAdvertHeader>) {
        let old_header = self.router_advert_header.clone();
        match received {
            Some(header) if header.router_lifetime != 0 => {
                self.router_advert_header = header.clone();
                self.learnt_router_advert_from_host = true;
            }
            _ => {
                self.router_advert_header = RouterAdvertHeader::default();
                self.learnt_router_advert_from_host = false;
            }
        }
        self.time_router_advert_last_update = Some(bctx.now());
        if self.router_advert_header != old_header {
            self.start_routing_policy_evaluation_jitter(bctx, ROUTING_POLICY_EVALUATION_JITTER);
        }
        self.reset_discovered_prefix_stale_timer(bctx);
    }

    // Keeps the discovered table consistent with a changed Network Data:
    // OMR prefixes reachable inside the mesh are evicted from the table, and
    // the default route is allowed into the Network Data only while some
    // valid OMR prefix carries the default-route flag.
    fn update_discovered_prefix_table_on_net_data_change(&mut self, bctx: &mut BC) {
        let mut allow_default_route = false;
        let configs = bctx.on_mesh_prefixes();
        let Self { discovered_prefix_table, counters, .. } = self;
        for config in &configs {
            if !is_valid_omr_prefix_config(config) {
                continue;
            }
            discovered_prefix_table.remove_route_prefix(bctx, &config.prefix);
            if config.default_route {
                allow_default_route = true;
            }
        }
        discovered_prefix_table.set_allow_default_route_in_net_data(
            bctx,
            counters,
            allow_default_route,
        );
    }

    fn handle_discovered_prefix_table_changed(&mut self, bctx: &mut BC) {
        if self.state == State::Stopped {
            return;
        }
        self.reset_discovered_prefix_stale_timer(bctx);
        self.start_routing_policy_evaluation_jitter(bctx, ROUTING_POLICY_EVALUATION_JITTER);
    }

    fn handle_discovered_prefix_stale_timer(&mut self, bctx: &mut BC) {
        if self.state == State::Stopped {
            return;
        }
        info!("stale discovered prefix or RA header, re-soliciting");
        self.start_router_solicitation_delay(bctx);
    }

    fn handle_on_link_prefix_deprecate_timer(&mut self) {
        info!("local on-link prefix {} fully deprecated", self.local_on_link_prefix);
    }

    fn reset_discovered_prefix_stale_timer(&mut self, bctx: &mut BC) {
        let now = bctx.now();
        let mut next_stale = self.discovered_prefix_table.calculate_next_stale_time(now);
        if self.learnt_router_advert_from_host {
            if let Some(updated) = self.time_router_advert_last_update {
                let header_stale =
                    now.max(updated.add(Duration::from_secs(STALE_RA_TIME_SECS.into())));
                next_stale = Some(next_stale.map_or(header_stale, |t| t.min(header_stale)));
            }
        }
        match next_stale {
            Some(time) => {
                let _: Option<BC::Instant> =
                    bctx.schedule_timer_instant(time, TimerId::DiscoveredPrefixStale);
            }
            None => {
                let _: Option<BC::Instant> = bctx.cancel_timer(TimerId::DiscoveredPrefixStale);
            }
        }
    }

    fn start_router_solicitation_delay(&mut self, bctx: &mut BC) {
        self.state = State::Soliciting;
        self.router_solicit_count = 0;
        self.time_router_solicit_start = None;
        let delay = bctx.rng().gen_range(Duration::ZERO..MAX_RTR_SOLICITATION_DELAY);
        debug!("router solicitation scheduled in {:?}", delay);
        let _: Option<BC::Instant> = bctx.schedule_timer(delay, TimerId::RouterSolicit);
    }

    fn handle_router_solicit_timer(&mut self, bctx: &mut BC) {
        if self.state != State::Soliciting {
            return;
        }
        if self.router_solicit_count < MAX_RTR_SOLICITATIONS {
            let next_delay = match self.send_router_solicitation(bctx) {
                Ok(()) => {
                    if self.router_solicit_count == 0 {
                        self.time_router_solicit_start = Some(bctx.now());
                    }
                    self.router_solicit_count += 1;
                    debug!("sent router solicitation {}", self.router_solicit_count);
                    RTR_SOLICITATION_INTERVAL
                }
                Err(SendError) => {
                    warn!("failed to send router solicitation, retrying");
                    RTR_SOLICITATION_RETRY_DELAY
                }
            };
            let _: Option<BC::Instant> = bctx.schedule_timer(next_delay, TimerId::RouterSolicit);
        } else {
            // The round is over: prefixes and RA parameters not refreshed by
            // any answer are presumed withdrawn.
            let solicit_start = self.time_router_solicit_start.unwrap_or_else(|| bctx.now());
            {
                let Self { discovered_prefix_table, counters, .. } = self;
                discovered_prefix_table.remove_or_deprecate_old_entries(
                    bctx,
                    counters,
                    solicit_start,
                );
            }
            if self.learnt_router_advert_from_host
                && self
                    .time_router_advert_last_update
                    .map_or(true, |updated| updated <= solicit_start)
            {
                self.update_router_advert_header(bctx, None);
            }
            self.router_solicit_count = 0;
            self.state = State::Advertising;
            self.reset_discovered_prefix_stale_timer(bctx);
            self.start_routing_policy_evaluation_delay(bctx, Duration::ZERO);
        }
    }

    fn send_router_solicitation(&mut self, bctx: &mut BC) -> Result<(), SendError> {
        let message = ndp::new_router_solicit_message();
        bctx.send_icmp6_nd(&message, all_routers_multicast())
            .map(|()| self.counters.tx_router_solicitation.increment())
            .map_err(|e| {
                self.counters.tx_failed.increment();
                e
            })
    }

    fn start_routing_policy_evaluation_jitter(&mut self, bctx: &mut BC, jitter: Duration) {
        let delay = bctx.rng().gen_range(Duration::ZERO..jitter);
        self.start_routing_policy_evaluation_delay(bctx, delay);
    }

    fn start_routing_policy_evaluation_delay(&mut self, bctx: &mut BC, delay: Duration) {
        let now = bctx.now();
        let mut evaluate_time = now.add(delay);
        // Keep consecutive RAs at least MIN_DELAY_BETWEEN_RTR_ADVS apart.
        if let Some(last_send) = self.last_router_advertisement_send_time {
            evaluate_time = evaluate_time.max(last_send.add(MIN_DELAY_BETWEEN_RTR_ADVS));
        }
        debug!(
            "routing policy evaluation scheduled in {:?}",
            evaluate_time.saturating_duration_since(now)
        );
        // Only ever move the timer earlier, coalescing triggers.
        match bctx.scheduled_instant(TimerId::RoutingPolicy) {
            Some(scheduled) if scheduled <= evaluate_time => {}
            _ => {
                let _: Option<BC::Instant> =
                    bctx.schedule_timer_instant(evaluate_time, TimerId::RoutingPolicy);
            }
        }
    }

    fn evaluate_routing_policy(&mut self, bctx: &mut BC) {
        if self.state == State::Stopped {
            return;
        }
        info!("evaluating routing policy");

        self.evaluate_on_link_prefix(bctx);
        let new_omr_prefixes = self.evaluate_omr_prefix(bctx);
        self.evaluate_nat64_prefix(bctx);

        self.send_router_advertisement(bctx, &new_omr_prefixes);
        if new_omr_prefixes.is_empty() {
            warn!("no OMR prefix advertised");
        }
        self.advertised_omr_prefixes = new_omr_prefixes;

        // Schedule the next unsolicited advertisement; the first few go out
        // on the accelerated initial schedule.
        let mut next_delay = bctx.rng().gen_range(MIN_RTR_ADV_INTERVAL..MAX_RTR_ADV_INTERVAL);
        if self.router_advertisement_count <= MAX_INIT_RTR_ADVERTISEMENTS
            && next_delay > MAX_INIT_RTR_ADV_INTERVAL
        {
            next_delay = MAX_INIT_RTR_ADV_INTERVAL;
        }
        self.start_routing_policy_evaluation_delay(bctx, next_delay);
    }

    fn evaluate_omr_prefix(&mut self, bctx: &mut BC) -> Vec<OmrPrefix> {
        let mut new_omr_prefixes: Vec<OmrPrefix> = Vec::with_capacity(MAX_OMR_PREFIXES);
        for config in bctx.on_mesh_prefixes() {
            if !is_valid_omr_prefix_config(&config) {
                continue;
            }
            if new_omr_prefixes.iter().any(|omr| omr.prefix == config.prefix) {
                continue;
            }
            if new_omr_prefixes.len() == MAX_OMR_PREFIXES {
                warn!("too many OMR prefixes, ignoring {}", config.prefix);
                continue;
            }
            new_omr_prefixes
                .push(OmrPrefix { prefix: config.prefix, preference: config.preference });
        }

        let local =
            OmrPrefix { prefix: self.local_omr_prefix, preference: LOCAL_OMR_PREFIX_PREFERENCE };
        let favored = new_omr_prefixes
            .iter()
            .copied()
            .reduce(|best, omr| if omr.is_favored_over(&best) { omr } else { best });

        match favored {
            Some(favored) if !local.is_favored_over(&favored) => {
                if favored.prefix != self.local_omr_prefix && self.is_local_omr_published {
                    // Another Border Router won; ours is withdrawn and not
                    // re-advertised even if it still lingers in the Network
                    // Data this round.
                    info!("found favored OMR prefix {} in Network Data", favored.prefix);
                    self.unpublish_local_omr_prefix(bctx);
                    let local_omr_prefix = self.local_omr_prefix;
                    new_omr_prefixes.retain(|omr| omr.prefix != local_omr_prefix);
                }
            }
            _ => {
                // No valid OMR prefix in the Network Data, or ours is the
                // favored one: make sure it is published and advertised.
                if self.publish_local_omr_prefix(bctx).is_ok()
                    && !new_omr_prefixes.iter().any(|omr| omr.prefix == local.prefix)
                {
                    if new_omr_prefixes.len() < MAX_OMR_PREFIXES {
                        new_omr_prefixes.push(local);
                    } else {
                        warn!("too many OMR prefixes, not advertising {}", local.prefix);
                    }
                }
            }
        }
        new_omr_prefixes
    }

    fn publish_local_omr_prefix(&mut self, bctx: &mut BC) -> Result<(), PublishError> {
        if self.is_local_omr_published {
            return Ok(());
        }
        bctx.publish_on_mesh_prefix(OnMeshPrefixConfig {
            prefix: self.local_omr_prefix,
            preference: LOCAL_OMR_PREFIX_PREFERENCE,
            on_mesh: true,
            slaac: true,
            preferred: true,
            stable: true,
            default_route: false,
        })
        .map(|()| {
            self.is_local_omr_published = true;
            info!("published local OMR prefix {}", self.local_omr_prefix);
        })
        .map_err(|e| {
            self.counters.net_data_publish_failed.increment();
            warn!("failed to publish local OMR prefix {}", self.local_omr_prefix);
            e
        })
    }

    fn unpublish_local_omr_prefix(&mut self, bctx: &mut BC) {
        bctx.unpublish_on_mesh_prefix(&self.local_omr_prefix);
        self.is_local_omr_published = false;
        info!("unpublished local OMR prefix {}", self.local_omr_prefix);
    }

    fn evaluate_on_link_prefix(&mut self, bctx: &mut BC) {
        // The table is being refreshed; any decision now would run on
        // half-withdrawn state.
        if self.state == State::Soliciting {
            return;
        }
        self.favored_discovered_on_link_prefix =
            self.discovered_prefix_table.find_favored_on_link_prefix();

        let advertise = match self.favored_discovered_on_link_prefix {
            None => true,
            // A numerically smaller (or equal) discovered prefix wins; this
            // keeps independent Border Routers from advertising competing
            // on-link prefixes.
            Some(favored) => self.local_on_link_prefix < favored,
        };
        if advertise {
            let _: Option<BC::Instant> = bctx.cancel_timer(TimerId::OnLinkPrefixDeprecate);
            if !self.is_advertising_local_on_link_prefix {
                self.is_advertising_local_on_link_prefix = true;
                info!("advertising local on-link prefix {}", self.local_on_link_prefix);
            }
        } else if self.is_advertising_local_on_link_prefix {
            self.deprecate_on_link_prefix(bctx);
        }
    }

    fn deprecate_on_link_prefix(&mut self, bctx: &mut BC) {
        self.is_advertising_local_on_link_prefix = false;
        info!("deprecating local on-link prefix {}", self.local_on_link_prefix);
        // Deprecation runs out DEFAULT_ON_LINK_PREFIX_LIFETIME after the
        // last advertisement with a non-zero preferred lifetime.
        let advertised_at = self.time_advertised_on_link_prefix.unwrap_or_else(|| bctx.now());
        let _: Option<BC::Instant> = bctx.schedule_timer_instant(
            advertised_at.add(Duration::from_secs(DEFAULT_ON_LINK_PREFIX_LIFETIME.into())),
            TimerId::OnLinkPrefixDeprecate,
        );
    }

    fn evaluate_nat64_prefix(&mut self, bctx: &mut BC) {
        let smallest_other = bctx
            .external_routes()
            .into_iter()
            .filter(|config| {
                config.nat64
                    && config.prefix.is_valid_nat64()
                    && config.prefix != self.local_nat64_prefix
            })
            .map(|config| config.prefix)
            .min();

        match smallest_other {
            Some(other) if other < self.local_nat64_prefix => {
                if self.is_advertising_local_nat64_prefix {
                    info!(
                        "withdrawing local NAT64 prefix {}: favored prefix {} exists",
                        self.local_nat64_prefix, other
                    );
                    bctx.unpublish_external_route(&self.local_nat64_prefix);
                    self.is_advertising_local_nat64_prefix = false;
                }
            }
            _ => {
                if !self.is_advertising_local_nat64_prefix {
                    match bctx.publish_external_route(ExternalRouteConfig {
                        prefix: self.local_nat64_prefix,
                        preference: RoutePreference::Low,
                        nat64: true,
                    }) {
                        Ok(()) => {
                            self.is_advertising_local_nat64_prefix = true;
                            info!("published local NAT64 prefix {}", self.local_nat64_prefix);
                        }
                        Err(PublishError) => {
                            self.counters.net_data_publish_failed.increment();
                            warn!(
                                "failed to publish local NAT64 prefix {}",
                                self.local_nat64_prefix
                            );
                        }
                    }
                }
            }
        }
    }

    fn send_router_advertisement(&mut self, bctx: &mut BC, new_omr_prefixes: &[OmrPrefix]) {
        let mut header = if self.learnt_router_advert_from_host {
            self.router_advert_header.clone()
        } else {
            RouterAdvertHeader::default()
        };
        // We are a border router, not a default gateway on this link.
        header.router_lifetime = 0;
        let mut ra = RouterAdvertBuilder::new(&header);

        let deprecate_deadline = bctx.scheduled_instant(TimerId::OnLinkPrefixDeprecate);
        if self.is_advertising_local_on_link_prefix || deprecate_deadline.is_some() {
            let (valid_lifetime, preferred_lifetime) = match deprecate_deadline {
                // While deprecating, the preferred lifetime is zero and the
                // valid lifetime counts down the remaining deprecation.
                Some(deadline) => {
                    (deadline.saturating_duration_since(bctx.now()).as_secs() as u32, 0)
                }
                None => (DEFAULT_ON_LINK_PREFIX_LIFETIME, DEFAULT_ON_LINK_PREFIX_LIFETIME),
            };
            match ra.append_prefix_info(&PrefixInfo {
                prefix: self.local_on_link_prefix,
                on_link: true,
                autonomous: true,
                valid_lifetime,
                preferred_lifetime,
            }) {
                Ok(()) => {
                    if self.is_advertising_local_on_link_prefix {
                        self.time_advertised_on_link_prefix = Some(bctx.now());
                    }
                }
                Err(e) => warn!("failed to append PIO for {}: {}", self.local_on_link_prefix, e),
            }
        }

        // Zero-lifetime RIOs invalidate the OMR prefixes we stop
        // advertising this round.
        for old in &self.advertised_omr_prefixes {
            if new_omr_prefixes.iter().any(|omr| omr.prefix == old.prefix) {
                continue;
            }
            if let Err(e) = ra.append_route_info(&RouteInfo {
                prefix: old.prefix,
                preference: RoutePreference::Medium,
                route_lifetime: 0,
            }) {
                warn!("failed to append invalidating RIO for {}: {}", old.prefix, e);
            }
        }
        for omr in new_omr_prefixes {
            if let Err(e) = ra.append_route_info(&RouteInfo {
                prefix: omr.prefix,
                preference: RoutePreference::Medium,
                route_lifetime: DEFAULT_OMR_PREFIX_LIFETIME,
            }) {
                warn!("failed to append RIO for {}: {}", omr.prefix, e);
            }
        }
        if self.is_advertising_local_nat64_prefix {
            if let Err(e) = ra.append_route_info(&RouteInfo {
                prefix: self.local_nat64_prefix,
                preference: RoutePreference::Low,
                route_lifetime: DEFAULT_NAT64_PREFIX_LIFETIME,
            }) {
                warn!("failed to append RIO for {}: {}", self.local_nat64_prefix, e);
            }
        }

        if !ra.contains_any_options() {
            return;
        }
        self.transmit_router_advertisement(bctx, &ra);
    }

    // The final RA before stopping: the default header (router lifetime 0)
    // and zero lifetimes for every locally owned prefix, so downstream hosts
    // withdraw their state immediately.
    fn send_final_router_advertisement(&mut self, bctx: &mut BC) {
        let mut ra = RouterAdvertBuilder::new(&RouterAdvertHeader::default());

        if self.is_advertising_local_on_link_prefix
            || bctx.scheduled_instant(TimerId::OnLinkPrefixDeprecate).is_some()
        {
            if let Err(e) = ra.append_prefix_info(&PrefixInfo {
                prefix: self.local_on_link_prefix,
                on_link: true,
                autonomous: true,
                valid_lifetime: 0,
                preferred_lifetime: 0,
            }) {
                warn!("failed to append PIO for {}: {}", self.local_on_link_prefix, e);
            }
        }
        for omr in &self.advertised_omr_prefixes {
            if let Err(e) = ra.append_route_info(&RouteInfo {
                prefix: omr.prefix,
                preference: RoutePreference::Medium,
                route_lifetime: 0,
            }) {
                warn!("failed to append invalidating RIO for {}: {}", omr.prefix, e);
            }
        }
        if self.is_advertising_local_nat64_prefix {
            if let Err(e) = ra.append_route_info(&RouteInfo {
                prefix: self.local_nat64_prefix,
                preference: RoutePreference::Low,
                route_lifetime: 0,
            }) {
                warn!("failed to append invalidating RIO for {}: {}", self.local_nat64_prefix, e);
            }
        }

        if !ra.contains_any_options() {
            return;
        }
        self.transmit_router_advertisement(bctx, &ra);
    }

    fn transmit_router_advertisement(&mut self, bctx: &mut BC, ra: &RouterAdvertBuilder) {
        match bctx.send_icmp6_nd(ra.as_bytes(), all_nodes_multicast()) {
            Ok(()) => {
                self.counters.tx_router_advertisement.increment();
                self.router_advertisement_count += 1;
                self.last_router_advertisement_send_time = Some(bctx.now());
                info!("sent RA on the infrastructure interface");
            }
            Err(SendError) => {
                self.counters.tx_failed.increment();
                warn!("failed to send RA on the infrastructure interface");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::context::testutil::FakeInstant;
    use crate::ndp::NdpOption;
    use crate::testutil::FakeBindingsCtx;

    const INFRA_IF_INDEX: u32 = 2;

    fn prefix(addr: [u16; 8], length: u8) -> Prefix {
        Prefix::new(Ipv6Addr::new(addr), length)
    }

    fn link_local(id: u16) -> Ipv6Addr {
        Ipv6Addr::new([0xfe80, 0, 0, 0, 0, 0, 0, id])
    }

    fn on_mesh_config(addr: [u16; 8], preference: RoutePreference) -> OnMeshPrefixConfig {
        OnMeshPrefixConfig {
            prefix: prefix(addr, 64),
            preference,
            on_mesh: true,
            slaac: true,
            preferred: false,
            stable: true,
            default_route: false,
        }
    }

    fn new_running_manager() -> (RoutingManager<FakeBindingsCtx>, FakeBindingsCtx) {
        let mut bctx = FakeBindingsCtx::new();
        let mut manager = RoutingManager::new();
        manager.init(&mut bctx, INFRA_IF_INDEX, true).expect("init");
        manager.handle_thread_role_changed(&mut bctx, true);
        manager.set_enabled(&mut bctx, true).expect("enable");
        (manager, bctx)
    }

    fn run_next_timer(
        manager: &mut RoutingManager<FakeBindingsCtx>,
        bctx: &mut FakeBindingsCtx,
    ) -> Option<TimerId> {
        let id = bctx.timers.trigger_next()?;
        manager.handle_timer(bctx, id);
        Some(id)
    }

    #[track_caller]
    fn run_until_policy_evaluated(
        manager: &mut RoutingManager<FakeBindingsCtx>,
        bctx: &mut FakeBindingsCtx,
    ) {
        for _ in 0..32 {
            match run_next_timer(manager, bctx) {
                Some(TimerId::RoutingPolicy) => return,
                Some(_) => {}
                None => panic!("ran out of timers before a policy evaluation"),
            }
        }
        panic!("routing policy never evaluated");
    }

    fn sent_router_advertisements(bctx: &FakeBindingsCtx) -> Vec<Vec<u8>> {
        bctx.infra_if
            .sent
            .iter()
            .filter(|message| message.packet[0] == ndp::ICMP6_TYPE_ROUTER_ADVERT)
            .map(|message| message.packet.clone())
            .collect()
    }

    fn sent_router_solicitations(bctx: &FakeBindingsCtx) -> usize {
        bctx.infra_if
            .sent
            .iter()
            .filter(|message| message.packet[0] == ndp::ICMP6_TYPE_ROUTER_SOLICIT)
            .count()
    }

    fn parse_ra(packet: &[u8]) -> (RouterAdvertHeader, Vec<NdpOption>) {
        let ra = RouterAdvertMessage::parse(packet).expect("well-formed RA");
        (ra.header().clone(), ra.options().collect())
    }

    #[track_caller]
    fn last_ra(bctx: &FakeBindingsCtx) -> (RouterAdvertHeader, Vec<NdpOption>) {
        let ras = sent_router_advertisements(bctx);
        parse_ra(ras.last().expect("an RA was sent"))
    }

    fn find_pio(options: &[NdpOption], prefix: &Prefix) -> Option<PrefixInfo> {
        options.iter().find_map(|option| match option {
            NdpOption::PrefixInfo(pio) if pio.prefix == *prefix => Some(*pio),
            _ => None,
        })
    }

    fn find_rio(options: &[NdpOption], prefix: &Prefix) -> Option<RouteInfo> {
        options.iter().find_map(|option| match option {
            NdpOption::RouteInfo(rio) if rio.prefix == *prefix => Some(*rio),
            _ => None,
        })
    }

    fn peer_ra_with_header(
        header: RouterAdvertHeader,
        build: impl FnOnce(&mut RouterAdvertBuilder),
    ) -> Vec<u8> {
        let mut builder = RouterAdvertBuilder::new(&header);
        build(&mut builder);
        builder.as_bytes().to_vec()
    }

    fn peer_ra(build: impl FnOnce(&mut RouterAdvertBuilder)) -> Vec<u8> {
        peer_ra_with_header(RouterAdvertHeader::default(), build)
    }

    fn on_link_pio(prefix: Prefix, valid: u32, preferred: u32) -> PrefixInfo {
        PrefixInfo {
            prefix,
            on_link: true,
            autonomous: true,
            valid_lifetime: valid,
            preferred_lifetime: preferred,
        }
    }

    #[test]
    fn cold_start_advertises_local_prefixes() {
        let (mut manager, mut bctx) = new_running_manager();

        // The first solicitation is delayed by up to a second (RFC 4861
        // section 6.3.7).
        bctx.timers.assert_timers_installed([(
            TimerId::RouterSolicit,
            FakeInstant::default()..FakeInstant::from(MAX_RTR_SOLICITATION_DELAY),
        )]);

        let mut rs_times = Vec::new();
        for i in 1..=3 {
            assert_eq!(run_next_timer(&mut manager, &mut bctx), Some(TimerId::RouterSolicit));
            assert_eq!(sent_router_solicitations(&bctx), i);
            rs_times.push(bctx.now());
        }
        assert_eq!(rs_times[1] - rs_times[0], RTR_SOLICITATION_INTERVAL);
        assert_eq!(rs_times[2] - rs_times[1], RTR_SOLICITATION_INTERVAL);
        assert!(bctx
            .infra_if
            .sent
            .iter()
            .filter(|message| message.packet[0] == ndp::ICMP6_TYPE_ROUTER_SOLICIT)
            .all(|message| message.dst == all_routers_multicast()));

        // One more interval concludes the round, and the policy evaluation
        // emits the first RA.
        assert_eq!(run_next_timer(&mut manager, &mut bctx), Some(TimerId::RouterSolicit));
        assert_eq!(manager.state, State::Advertising);
        assert_eq!(run_next_timer(&mut manager, &mut bctx), Some(TimerId::RoutingPolicy));
        assert!(bctx.now() <= FakeInstant::from(Duration::from_secs(13)));

        let ras = sent_router_advertisements(&bctx);
        assert_eq!(ras.len(), 1);
        let (header, options) = parse_ra(&ras[0]);
        assert_eq!(header.router_lifetime, 0);

        let on_link = manager.on_link_prefix().expect("initialized");
        let pio = find_pio(&options, &on_link).expect("PIO for the local on-link prefix");
        assert_eq!((pio.on_link, pio.autonomous), (true, true));
        assert_eq!(pio.valid_lifetime, DEFAULT_ON_LINK_PREFIX_LIFETIME);
        assert_eq!(pio.preferred_lifetime, DEFAULT_ON_LINK_PREFIX_LIFETIME);

        let omr = manager.omr_prefix().expect("initialized");
        let rio = find_rio(&options, &omr).expect("RIO for the local OMR prefix");
        assert_eq!(rio.route_lifetime, DEFAULT_OMR_PREFIX_LIFETIME);
        assert_eq!(rio.preference, RoutePreference::Medium);

        assert_matches!(
            bctx.net_data.on_mesh_prefix(&omr),
            Some(OnMeshPrefixConfig {
                preference: RoutePreference::Low,
                on_mesh: true,
                slaac: true,
                stable: true,
                ..
            })
        );
        let nat64 = manager.nat64_prefix().expect("initialized");
        assert_matches!(
            bctx.net_data.external_route(&nat64),
            Some(ExternalRouteConfig { preference: RoutePreference::Low, nat64: true, .. })
        );
        assert_eq!(bctx.infra_if.sent.last().expect("sent").dst, all_nodes_multicast());
    }

    #[test]
    fn favored_discovered_on_link_prefix_deprecates_local() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let advertised_at = bctx.now();

        // A numerically smaller on-link prefix appears on the link.
        let discovered = prefix([0x2001, 0xdb8, 0xa, 0, 0, 0, 0, 0], 64);
        let ra = peer_ra(|builder| {
            builder.append_prefix_info(&on_link_pio(discovered, 1800, 1800)).expect("append");
        });
        manager.handle_received(&mut bctx, &ra, link_local(1));

        assert_eq!(
            run_next_timer(&mut manager, &mut bctx),
            Some(TimerId::DiscoveredPrefixTableChanged)
        );
        // The evaluation is paced behind the previous RA.
        let policy_at = bctx.timers.scheduled_instant(TimerId::RoutingPolicy).expect("armed");
        assert!(policy_at >= advertised_at + MIN_DELAY_BETWEEN_RTR_ADVS);
        run_until_policy_evaluated(&mut manager, &mut bctx);

        assert_eq!(manager.favored_discovered_on_link_prefix, Some(discovered));
        assert!(!manager.is_advertising_local_on_link_prefix);

        // The local prefix deprecates rather than disappearing: preferred
        // lifetime zero, valid lifetime counting down the rest.
        let (_, options) = last_ra(&bctx);
        let local = manager.on_link_prefix().expect("initialized");
        let pio = find_pio(&options, &local).expect("deprecating PIO");
        assert_eq!(pio.preferred_lifetime, 0);
        assert!(pio.valid_lifetime > 0 && pio.valid_lifetime <= DEFAULT_ON_LINK_PREFIX_LIFETIME);
        assert_eq!(
            bctx.timers.scheduled_instant(TimerId::OnLinkPrefixDeprecate),
            Some(
                advertised_at
                    + Duration::from_secs(u64::from(DEFAULT_ON_LINK_PREFIX_LIFETIME))
            )
        );
    }

    #[test]
    fn removal_on_advertise_restores_local_on_link_prefix() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);

        let discovered = prefix([0x2001, 0xdb8, 0xa, 0, 0, 0, 0, 0], 64);
        let ra = peer_ra(|builder| {
            builder.append_prefix_info(&on_link_pio(discovered, 1800, 1800)).expect("append");
        });
        manager.handle_received(&mut bctx, &ra, link_local(1));
        run_until_policy_evaluated(&mut manager, &mut bctx);
        assert!(!manager.is_advertising_local_on_link_prefix);

        // The peer withdraws the prefix with a zero valid lifetime.
        let withdraw = peer_ra(|builder| {
            builder.append_prefix_info(&on_link_pio(discovered, 0, 0)).expect("append");
        });
        manager.handle_received(&mut bctx, &withdraw, link_local(1));
        run_until_policy_evaluated(&mut manager, &mut bctx);

        assert_eq!(manager.favored_discovered_on_link_prefix, None);
        assert!(manager.is_advertising_local_on_link_prefix);
        assert_eq!(bctx.timers.scheduled_instant(TimerId::OnLinkPrefixDeprecate), None);

        let (_, options) = last_ra(&bctx);
        let local = manager.on_link_prefix().expect("initialized");
        let pio = find_pio(&options, &local).expect("re-advertised PIO");
        assert_eq!(pio.preferred_lifetime, DEFAULT_ON_LINK_PREFIX_LIFETIME);
        assert_eq!(pio.valid_lifetime, DEFAULT_ON_LINK_PREFIX_LIFETIME);
    }

    #[test]
    fn peer_omr_prefix_supersedes_local() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let local_omr = manager.omr_prefix().expect("initialized");
        assert!(bctx.net_data.on_mesh_prefix(&local_omr).is_some());

        let peer = prefix([0xfd00, 0xabcd, 0, 0, 0, 0, 0, 0], 64);
        bctx.net_data
            .on_mesh
            .push(on_mesh_config([0xfd00, 0xabcd, 0, 0, 0, 0, 0, 0], RoutePreference::Medium));
        manager.handle_network_data_changed(&mut bctx);
        run_until_policy_evaluated(&mut manager, &mut bctx);

        assert_eq!(bctx.net_data.on_mesh_prefix(&local_omr), None);
        assert_eq!(
            manager.advertised_omr_prefixes().iter().map(|omr| *omr.prefix()).collect::<Vec<_>>(),
            [peer]
        );

        let (_, options) = last_ra(&bctx);
        let fresh = find_rio(&options, &peer).expect("RIO for the peer OMR prefix");
        assert_eq!(fresh.route_lifetime, DEFAULT_OMR_PREFIX_LIFETIME);
        let retracted = find_rio(&options, &local_omr).expect("invalidating RIO");
        assert_eq!(retracted.route_lifetime, 0);
    }

    #[test]
    fn discovered_route_entry_expires_and_unpublishes() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);

        let route = prefix([0x2001, 0xdb8, 0xb, 0, 0, 0, 0, 0], 64);
        let ra = peer_ra(|builder| {
            builder
                .append_route_info(&RouteInfo {
                    prefix: route,
                    preference: RoutePreference::Medium,
                    route_lifetime: 5,
                })
                .expect("append");
        });
        let received_at = bctx.now();
        manager.handle_received(&mut bctx, &ra, link_local(1));
        assert!(bctx.net_data.external_route(&route).is_some());
        let expiry = received_at + Duration::from_secs(5);
        assert_eq!(bctx.timers.scheduled_instant(TimerId::DiscoveredPrefixExpiry), Some(expiry));

        while bctx.timers.earliest_deadline().map_or(false, |deadline| deadline <= expiry) {
            let _ = run_next_timer(&mut manager, &mut bctx);
        }

        assert_eq!(bctx.net_data.external_route(&route), None);
        assert!(bctx.timers.scheduled_instant(TimerId::RoutingPolicy).is_some());
    }

    #[test]
    fn graceful_stop_retracts_everything() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let local_omr = manager.omr_prefix().expect("initialized");
        let local_on_link = manager.on_link_prefix().expect("initialized");
        let nat64 = manager.nat64_prefix().expect("initialized");
        let ras_before = sent_router_advertisements(&bctx).len();
        let ra_count_before = manager.counters().rx_router_advertisement.get();

        manager.set_enabled(&mut bctx, false).expect("disable");

        let ras = sent_router_advertisements(&bctx);
        assert_eq!(ras.len(), ras_before + 1);
        let (header, options) = parse_ra(ras.last().expect("final RA"));
        assert_eq!(header, RouterAdvertHeader::default());
        let pio = find_pio(&options, &local_on_link).expect("retracting PIO");
        assert_eq!((pio.valid_lifetime, pio.preferred_lifetime), (0, 0));
        assert_eq!(find_rio(&options, &local_omr).expect("retracting RIO").route_lifetime, 0);
        assert_eq!(find_rio(&options, &nat64).expect("retracting NAT64 RIO").route_lifetime, 0);

        assert_eq!(bctx.net_data.on_mesh_prefix(&local_omr), None);
        assert_eq!(bctx.net_data.external_route(&nat64), None);
        assert_eq!(manager.state, State::Stopped);
        // With every timer cancelled nothing can emit another RA until
        // restart.
        bctx.timers.assert_no_timers_installed();

        // Received messages are ignored while stopped.
        manager.handle_received(&mut bctx, &peer_ra(|_| {}), link_local(1));
        assert_eq!(manager.counters().rx_router_advertisement.get(), ra_count_before);
    }

    #[test]
    fn set_enabled_is_idempotent() {
        let (mut manager, mut bctx) = new_running_manager();
        let timers_before = bctx.timers.timers();
        assert_eq!(manager.set_enabled(&mut bctx, true), Ok(()));
        assert_eq!(bctx.timers.timers(), timers_before);

        assert_eq!(manager.set_enabled(&mut bctx, false), Ok(()));
        assert_eq!(manager.set_enabled(&mut bctx, false), Ok(()));
        bctx.timers.assert_no_timers_installed();
    }

    #[test]
    fn operations_require_initialization() {
        let mut bctx = FakeBindingsCtx::new();
        let mut manager = RoutingManager::<FakeBindingsCtx>::new();
        assert_eq!(manager.set_enabled(&mut bctx, true), Err(Error::InvalidState));
        assert_eq!(manager.omr_prefix(), Err(Error::InvalidState));
        assert_eq!(manager.on_link_prefix(), Err(Error::InvalidState));
        assert_eq!(manager.nat64_prefix(), Err(Error::InvalidState));

        assert_eq!(manager.init(&mut bctx, 0, true), Err(Error::InvalidArgs));
        assert_eq!(manager.init(&mut bctx, INFRA_IF_INDEX, true), Ok(()));
        assert_eq!(manager.init(&mut bctx, INFRA_IF_INDEX, true), Err(Error::InvalidState));
    }

    #[test]
    fn local_prefixes_are_derived_and_persisted() {
        let mut bctx = FakeBindingsCtx::new();
        let mut manager = RoutingManager::new();
        manager.init(&mut bctx, INFRA_IF_INDEX, true).expect("init");
        let omr = manager.omr_prefix().expect("initialized");
        let nat64 = manager.nat64_prefix().expect("initialized");
        let on_link = manager.on_link_prefix().expect("initialized");

        let ula = bctx.settings.br_ula_prefix.expect("BR ULA prefix saved");
        assert!(ula.is_valid_br_ula());
        assert_eq!(omr, ula.with_subnet_id(1, prefix::OMR_PREFIX_LENGTH));
        assert_eq!(nat64, ula.with_subnet_id(2, prefix::NAT64_PREFIX_LENGTH));
        assert_eq!(bctx.settings.on_link_prefix, Some(on_link));

        // A manager loading the same settings derives identical prefixes,
        // no matter its RNG.
        let mut other_bctx = FakeBindingsCtx::with_rng_seed(77);
        other_bctx.settings.br_ula_prefix = Some(ula);
        other_bctx.settings.on_link_prefix = Some(on_link);
        let mut other = RoutingManager::new();
        other.init(&mut other_bctx, INFRA_IF_INDEX, true).expect("init");
        assert_eq!(other.omr_prefix(), Ok(omr));
        assert_eq!(other.on_link_prefix(), Ok(on_link));
        assert_eq!(other.nat64_prefix(), Ok(nat64));
    }

    #[test]
    fn advertised_omr_prefixes_are_capped_and_valid() {
        let (mut manager, mut bctx) = new_running_manager();
        for i in 0..5u16 {
            bctx.net_data
                .on_mesh
                .push(on_mesh_config([0xfd00, i + 1, 0, 0, 0, 0, 0, 0], RoutePreference::Medium));
        }
        run_until_policy_evaluated(&mut manager, &mut bctx);

        let advertised = manager.advertised_omr_prefixes();
        assert_eq!(advertised.len(), MAX_OMR_PREFIXES);
        assert!(advertised.iter().all(|omr| omr.prefix().is_valid_omr()));
    }

    #[test]
    fn identical_inputs_converge_across_border_routers() {
        let run = |seed: u128| {
            let mut bctx = FakeBindingsCtx::with_rng_seed(seed);
            bctx.net_data
                .on_mesh
                .push(on_mesh_config([0xfd00, 0xabcd, 0, 0, 0, 0, 0, 0], RoutePreference::Medium));
            let mut manager = RoutingManager::new();
            manager.init(&mut bctx, INFRA_IF_INDEX, true).expect("init");
            manager.handle_thread_role_changed(&mut bctx, true);
            manager.set_enabled(&mut bctx, true).expect("enable");
            run_until_policy_evaluated(&mut manager, &mut bctx);

            let discovered = prefix([0x2001, 0xdb8, 0xa, 0, 0, 0, 0, 0], 64);
            let ra = peer_ra(|builder| {
                builder.append_prefix_info(&on_link_pio(discovered, 1800, 1800)).expect("append");
            });
            manager.handle_received(&mut bctx, &ra, link_local(1));
            run_until_policy_evaluated(&mut manager, &mut bctx);

            (
                manager.advertised_omr_prefixes().to_vec(),
                manager.is_advertising_local_on_link_prefix,
            )
        };

        // The jitter differs between the seeds; the decisions must not.
        assert_eq!(run(1), run(999));
    }

    #[test]
    fn failed_router_solicitation_is_retried() {
        let (mut manager, mut bctx) = new_running_manager();
        bctx.infra_if.fail_sends = true;
        assert_eq!(run_next_timer(&mut manager, &mut bctx), Some(TimerId::RouterSolicit));
        assert_eq!(manager.counters().tx_failed.get(), 1);
        assert_eq!(manager.router_solicit_count, 0);
        assert_eq!(
            bctx.timers.scheduled_instant(TimerId::RouterSolicit),
            Some(bctx.now() + RTR_SOLICITATION_RETRY_DELAY)
        );

        bctx.infra_if.fail_sends = false;
        assert_eq!(run_next_timer(&mut manager, &mut bctx), Some(TimerId::RouterSolicit));
        assert_eq!(manager.router_solicit_count, 1);
        assert_eq!(sent_router_solicitations(&bctx), 1);
    }

    #[test]
    fn ra_header_learned_from_host_daemon() {
        let (mut manager, mut bctx) = new_running_manager();
        let host_addr = link_local(0x99);
        bctx.infra_if.addresses.push(host_addr);
        run_until_policy_evaluated(&mut manager, &mut bctx);

        let learned = RouterAdvertHeader {
            cur_hop_limit: 64,
            flags: 0x80,
            router_lifetime: 1800,
            reachable_time: 30000,
            retrans_timer: 1000,
        };
        manager.handle_received(&mut bctx, &peer_ra_with_header(learned, |_| {}), host_addr);
        assert!(manager.learnt_router_advert_from_host);
        // The stale timer now tracks the learned header.
        assert!(bctx.timers.scheduled_instant(TimerId::DiscoveredPrefixStale).is_some());

        run_until_policy_evaluated(&mut manager, &mut bctx);
        let (header, _) = last_ra(&bctx);
        // Learned fields are carried, but we never advertise ourselves as a
        // default router.
        assert_eq!(header.cur_hop_limit, 64);
        assert_eq!(header.flags, 0x80);
        assert_eq!(header.reachable_time, 30000);
        assert_eq!(header.retrans_timer, 1000);
        assert_eq!(header.router_lifetime, 0);

        // Disabling forgets the learned header.
        manager.set_enabled(&mut bctx, false).expect("disable");
        assert!(!manager.learnt_router_advert_from_host);
        assert_eq!(manager.router_advert_header, RouterAdvertHeader::default());
    }

    #[test]
    fn stale_discovered_prefix_triggers_resolicitation() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);

        let discovered = prefix([0x2001, 0xdb8, 0xa, 0, 0, 0, 0, 0], 64);
        let received_at = bctx.now();
        let ra = peer_ra(|builder| {
            builder.append_prefix_info(&on_link_pio(discovered, 3600, 3600)).expect("append");
        });
        manager.handle_received(&mut bctx, &ra, link_local(1));
        assert_eq!(
            run_next_timer(&mut manager, &mut bctx),
            Some(TimerId::DiscoveredPrefixTableChanged)
        );
        // The prefix lifetime exceeds the stale bound, which caps the timer.
        assert_eq!(
            bctx.timers.scheduled_instant(TimerId::DiscoveredPrefixStale),
            Some(received_at + Duration::from_secs(u64::from(STALE_RA_TIME_SECS)))
        );

        for _ in 0..64 {
            match run_next_timer(&mut manager, &mut bctx) {
                Some(TimerId::DiscoveredPrefixStale) => break,
                Some(_) => {}
                None => panic!("stale timer never fired"),
            }
        }
        assert_eq!(manager.state, State::Soliciting);
        assert!(bctx.timers.scheduled_instant(TimerId::RouterSolicit).is_some());
    }

    #[test]
    fn router_advertisements_are_paced() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let last_ra_at = bctx.now();

        // An immediate solicitation cannot elicit an RA within the minimum
        // spacing.
        let rs = ndp::new_router_solicit_message();
        manager.handle_received(&mut bctx, &rs, link_local(7));
        assert_eq!(manager.counters().rx_router_solicitation.get(), 1);
        let policy_at = bctx.timers.scheduled_instant(TimerId::RoutingPolicy).expect("armed");
        assert_eq!(policy_at, last_ra_at + MIN_DELAY_BETWEEN_RTR_ADVS);

        run_until_policy_evaluated(&mut manager, &mut bctx);
        assert_eq!(bctx.now(), policy_at);
        assert_eq!(sent_router_advertisements(&bctx).len(), 2);
    }

    #[test]
    fn malformed_messages_are_counted_and_dropped() {
        let (mut manager, mut bctx) = new_running_manager();

        // Truncated RA.
        manager.handle_received(&mut bctx, &[134, 0, 0], link_local(1));
        assert_eq!(manager.counters().rx_dropped.get(), 1);
        // RA from a non-link-local source.
        let ra = peer_ra(|_| {});
        manager.handle_received(&mut bctx, &ra, Ipv6Addr::new([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]));
        assert_eq!(manager.counters().rx_dropped.get(), 2);
        // Truncated RS.
        manager.handle_received(&mut bctx, &[133, 0], link_local(1));
        assert_eq!(manager.counters().rx_dropped.get(), 3);
    }

    #[test]
    fn nat64_prefix_defers_to_smaller_published_prefix() {
        let (mut manager, mut bctx) = new_running_manager();
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let nat64 = manager.nat64_prefix().expect("initialized");
        assert!(bctx.net_data.external_route(&nat64).is_some());

        // Another Border Router publishes a numerically smaller NAT64
        // prefix.
        let other = prefix([0x2001, 0xdb8, 0x64, 0x64, 0, 0, 0, 0], 96);
        bctx.net_data.external.push(ExternalRouteConfig {
            prefix: other,
            preference: RoutePreference::Medium,
            nat64: true,
        });
        manager.handle_network_data_changed(&mut bctx);
        run_until_policy_evaluated(&mut manager, &mut bctx);

        assert!(!manager.is_advertising_local_nat64_prefix);
        assert_eq!(bctx.net_data.external_route(&nat64), None);
    }

    #[test]
    fn network_data_publish_failure_is_not_fatal() {
        let (mut manager, mut bctx) = new_running_manager();
        bctx.net_data.fail_publish = true;
        run_until_policy_evaluated(&mut manager, &mut bctx);
        assert!(manager.counters().net_data_publish_failed.get() >= 1);
        // The local OMR prefix cannot be advertised while unpublished.
        assert!(manager.advertised_omr_prefixes().is_empty());

        // Publication is retried on the next evaluation.
        bctx.net_data.fail_publish = false;
        run_until_policy_evaluated(&mut manager, &mut bctx);
        let omr = manager.omr_prefix().expect("initialized");
        assert!(bctx.net_data.on_mesh_prefix(&omr).is_some());
        assert_eq!(manager.advertised_omr_prefixes().len(), 1);
    }
}
