// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Testing-related utilities: a fake bindings context wiring together the
//! fake clock, timer queue and RNG with recording fakes of the platform
//! adapters.

use net_types::ip::Ipv6Addr;

use crate::context::testutil::{FakeCryptoRng, FakeInstant, FakeTimerCtx};
use crate::context::{InstantBindingsTypes, InstantContext, RngContext, TimerContext};
use crate::infra_if::{InfraIfContext, SendError};
use crate::net_data::{
    ExternalRouteConfig, NetworkDataContext, OnMeshPrefixConfig, PublishError,
};
use crate::prefix::Prefix;
use crate::settings::SettingsContext;
use crate::time::TimerId;

/// A transmitted ICMPv6 message and its destination.
#[derive(Clone, Debug)]
pub(crate) struct SentMessage {
    pub(crate) packet: Vec<u8>,
    pub(crate) dst: Ipv6Addr,
}

/// A recording fake of the infrastructure interface.
#[derive(Default)]
pub(crate) struct FakeInfraIf {
    /// Addresses assigned to the interface itself, for host-side RA
    /// recognition.
    pub(crate) addresses: Vec<Ipv6Addr>,
    /// Everything transmitted, in order.
    pub(crate) sent: Vec<SentMessage>,
    /// When set, sends fail.
    pub(crate) fail_sends: bool,
}

/// A fake of the Thread Network Data holding published entries.
#[derive(Default)]
pub(crate) struct FakeNetworkData {
    pub(crate) on_mesh: Vec<OnMeshPrefixConfig>,
    pub(crate) external: Vec<ExternalRouteConfig>,
    /// When set, publications fail.
    pub(crate) fail_publish: bool,
}

impl FakeNetworkData {
    pub(crate) fn on_mesh_prefix(&self, prefix: &Prefix) -> Option<OnMeshPrefixConfig> {
        self.on_mesh.iter().find(|config| config.prefix == *prefix).copied()
    }

    pub(crate) fn external_route(&self, prefix: &Prefix) -> Option<ExternalRouteConfig> {
        self.external.iter().find(|config| config.prefix == *prefix).copied()
    }
}

/// A fake of the persistent settings store.
#[derive(Default)]
pub(crate) struct FakeSettings {
    pub(crate) br_ula_prefix: Option<Prefix>,
    pub(crate) on_link_prefix: Option<Prefix>,
}

/// The fake bindings context driving the core in tests.
pub(crate) struct FakeBindingsCtx {
    pub(crate) timers: FakeTimerCtx<TimerId>,
    pub(crate) rng: FakeCryptoRng,
    pub(crate) infra_if: FakeInfraIf,
    pub(crate) net_data: FakeNetworkData,
    pub(crate) settings: FakeSettings,
}

impl FakeBindingsCtx {
    pub(crate) fn new() -> FakeBindingsCtx {
        FakeBindingsCtx::with_rng_seed(12957992561116578403)
    }

    pub(crate) fn with_rng_seed(seed: u128) -> FakeBindingsCtx {
        FakeBindingsCtx {
            timers: FakeTimerCtx::default(),
            rng: FakeCryptoRng::new_xorshift(seed),
            infra_if: FakeInfraIf::default(),
            net_data: FakeNetworkData::default(),
            settings: FakeSettings::default(),
        }
    }
}

impl InstantBindingsTypes for FakeBindingsCtx {
    type Instant = FakeInstant;
}

impl InstantContext for FakeBindingsCtx {
    fn now(&self) -> FakeInstant {
        self.timers.now()
    }
}

impl TimerContext<TimerId> for FakeBindingsCtx {
    fn schedule_timer_instant(&mut self, time: FakeInstant, id: TimerId) -> Option<FakeInstant> {
        self.timers.schedule_timer_instant(time, id)
    }

    fn cancel_timer(&mut self, id: TimerId) -> Option<FakeInstant> {
        self.timers.cancel_timer(id)
    }

    fn scheduled_instant(&self, id: TimerId) -> Option<FakeInstant> {
        self.timers.scheduled_instant(id)
    }
}

impl RngContext for FakeBindingsCtx {
    type Rng<'a> = &'a mut FakeCryptoRng where Self: 'a;

    fn rng(&mut self) -> Self::Rng<'_> {
        &mut self.rng
    }
}

impl InfraIfContext for FakeBindingsCtx {
    fn send_icmp6_nd(&mut self, packet: &[u8], dst: Ipv6Addr) -> Result<(), SendError> {
        let FakeInfraIf { addresses: _, sent, fail_sends } = &mut self.infra_if;
        if *fail_sends {
            return Err(SendError);
        }
        sent.push(SentMessage { packet: packet.to_vec(), dst });
        Ok(())
    }

    fn has_address(&self, addr: &Ipv6Addr) -> bool {
        self.infra_if.addresses.contains(addr)
    }
}

impl NetworkDataContext for FakeBindingsCtx {
    fn publish_on_mesh_prefix(&mut self, config: OnMeshPrefixConfig) -> Result<(), PublishError> {
        let FakeNetworkData { on_mesh, external: _, fail_publish } = &mut self.net_data;
        if *fail_publish {
            return Err(PublishError);
        }
        on_mesh.retain(|existing| existing.prefix != config.prefix);
        on_mesh.push(config);
        Ok(())
    }

    fn unpublish_on_mesh_prefix(&mut self, prefix: &Prefix) {
        self.net_data.on_mesh.retain(|existing| existing.prefix != *prefix);
    }

    fn publish_external_route(&mut self, config: ExternalRouteConfig) -> Result<(), PublishError> {
        let FakeNetworkData { on_mesh: _, external, fail_publish } = &mut self.net_data;
        if *fail_publish {
            return Err(PublishError);
        }
        external.retain(|existing| existing.prefix != config.prefix);
        external.push(config);
        Ok(())
    }

    fn unpublish_external_route(&mut self, prefix: &Prefix) {
        self.net_data.external.retain(|existing| existing.prefix != *prefix);
    }

    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefixConfig> {
        self.net_data.on_mesh.clone()
    }

    fn external_routes(&self) -> Vec<ExternalRouteConfig> {
        self.net_data.external.clone()
    }
}

impl SettingsContext for FakeBindingsCtx {
    fn load_br_ula_prefix(&self) -> Option<Prefix> {
        self.settings.br_ula_prefix
    }

    fn save_br_ula_prefix(&mut self, prefix: &Prefix) {
        self.settings.br_ula_prefix = Some(*prefix);
    }

    fn load_on_link_prefix(&self) -> Option<Prefix> {
        self.settings.on_link_prefix
    }

    fn save_on_link_prefix(&mut self, prefix: &Prefix) {
        self.settings.on_link_prefix = Some(*prefix);
    }
}
